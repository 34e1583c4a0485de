use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{LicsError, Result};
use crate::infrastructure::QuotaSource;
use crate::types::AlgorithmId;

#[derive(Default)]
struct StaticQuota {
    // Map of Algorithm ID -> provisioned total
    totals: HashMap<AlgorithmId, u32>,
    // Last usage pushed by the reconciler
    pushed: Option<HashMap<AlgorithmId, u32>>,
    unreachable: bool,
}

/// In-process quota source with fixed totals.
///
/// Cloning shares the same state, so a handle kept outside the reconciler can
/// change totals or simulate an outage while the loop runs.
#[derive(Clone, Default)]
pub struct StaticQuotaSource {
    inner: Arc<Mutex<StaticQuota>>,
}

impl StaticQuotaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_totals(totals: impl IntoIterator<Item = (AlgorithmId, u32)>) -> Self {
        let source = Self::new();
        source.inner.lock().totals.extend(totals);
        source
    }

    pub fn set_total(&self, algorithm_id: AlgorithmId, total: u32) {
        self.inner.lock().totals.insert(algorithm_id, total);
    }

    /// While unreachable, both fetch and push fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.lock().unreachable = !reachable;
    }

    pub fn last_pushed(&self) -> Option<HashMap<AlgorithmId, u32>> {
        self.inner.lock().pushed.clone()
    }
}

impl QuotaSource for StaticQuotaSource {
    fn fetch_total_quota(&mut self) -> Result<HashMap<AlgorithmId, u32>> {
        let inner = self.inner.lock();
        if inner.unreachable {
            return Err(LicsError::Unknown("quota source unreachable".to_string()));
        }
        Ok(inner.totals.clone())
    }

    fn push_used_quota(&mut self, used: &HashMap<AlgorithmId, u32>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.unreachable {
            return Err(LicsError::Unknown("quota source unreachable".to_string()));
        }
        inner.pushed = Some(used.clone());
        Ok(())
    }
}
