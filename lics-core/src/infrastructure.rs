use std::collections::HashMap;

use crate::error::Result;
use crate::types::AlgorithmId;

/// The remote quota authority, seen from the reconciliation loop.
///
/// Both calls are best effort: the reconciler logs a failure and tries again on
/// its next cycle. Implementations may block; they are never called while the
/// ledger lock is held.
pub trait QuotaSource: Send {
    /// Current provisioned total per algorithm
    fn fetch_total_quota(&mut self) -> Result<HashMap<AlgorithmId, u32>>;

    /// Aggregate usage per algorithm
    fn push_used_quota(&mut self, used: &HashMap<AlgorithmId, u32>) -> Result<()>;
}
