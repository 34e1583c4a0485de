use serde::{Deserialize, Serialize};

use super::{AlgorithmId, TaskClass};

/// Per-algorithm license counters held by the server.
///
/// Invariant: `used <= total`. Every mutation saturates instead of failing,
/// so a request for more than is available is a partial grant, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmLicensePool {
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    pub total: u32,
    pub used: u32,
}

impl AlgorithmLicensePool {
    /// A pool starts empty until the first quota pull sets its total.
    pub fn new(algorithm_id: AlgorithmId, task_class: TaskClass) -> Self {
        Self {
            algorithm_id,
            task_class,
            total: 0,
            used: 0,
        }
    }

    pub fn with_total(mut self, total: u32) -> Self {
        self.total = total;
        self
    }

    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }

    /// Grants `min(requested, available)` and returns the amount granted.
    pub fn grant(&mut self, requested: u32) -> u32 {
        let granted = requested.min(self.available());
        self.used += granted;
        granted
    }

    /// Returns up to `amount` licenses to the pool; never drops below zero.
    pub fn reclaim(&mut self, amount: u32) -> u32 {
        let released = amount.min(self.used);
        self.used -= released;
        released
    }

    /// Applies a freshly fetched total. A total below current usage is raised
    /// to `used` so the invariant holds while outstanding grants drain.
    pub fn apply_total(&mut self, fetched: u32) -> u32 {
        self.total = fetched.max(self.used);
        self.total
    }
}
