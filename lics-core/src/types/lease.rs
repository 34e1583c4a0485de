use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{AlgorithmId, Token};

/// Liveness of a client lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseState {
    /// Heartbeats arriving within the timeout window
    Active,
    /// At least one reconciliation cycle saw an overdue heartbeat
    Degraded,
    /// Miss threshold reached; the lease is deleted and its licenses reclaimed
    Expired,
}

/// Server-side record of one authenticated client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLease {
    /// Token issued on authentication, never reused
    pub token: Token,
    /// When the lease was created
    pub authenticated_at: u64,
    /// Last heartbeat timestamp (ms since epoch)
    pub last_heartbeat_at: u64,
    /// Consecutive reconciliation cycles without a heartbeat
    pub missed_heartbeats: u32,
    /// VIDEO licenses the ledger has debited to this client
    pub per_algorithm_usage: HashMap<AlgorithmId, u32>,
    /// PICTURE algorithms this client has reported, with the last reported usage.
    /// Advisory only; never debited from a pool.
    pub picture_reports: HashMap<AlgorithmId, u32>,
}

impl ClientLease {
    pub fn new(token: Token, now: u64) -> Self {
        Self {
            token,
            authenticated_at: now,
            last_heartbeat_at: now,
            missed_heartbeats: 0,
            per_algorithm_usage: HashMap::new(),
            picture_reports: HashMap::new(),
        }
    }

    pub fn usage(&self, algorithm_id: AlgorithmId) -> u32 {
        self.per_algorithm_usage
            .get(&algorithm_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn add_usage(&mut self, algorithm_id: AlgorithmId, amount: u32) {
        if amount == 0 {
            return;
        }
        *self.per_algorithm_usage.entry(algorithm_id).or_insert(0) += amount;
    }

    pub fn sub_usage(&mut self, algorithm_id: AlgorithmId, amount: u32) {
        if let Some(used) = self.per_algorithm_usage.get_mut(&algorithm_id) {
            *used = used.saturating_sub(amount);
            if *used == 0 {
                self.per_algorithm_usage.remove(&algorithm_id);
            }
        }
    }

    pub fn has_reported(&self, algorithm_id: AlgorithmId) -> bool {
        self.picture_reports.contains_key(&algorithm_id)
    }

    /// A heartbeat returns the lease to `Active`.
    pub fn touch(&mut self, now: u64) {
        self.last_heartbeat_at = now;
        self.missed_heartbeats = 0;
    }

    pub fn state(&self, miss_threshold: u32) -> LeaseState {
        if self.missed_heartbeats >= miss_threshold {
            LeaseState::Expired
        } else if self.missed_heartbeats > 0 {
            LeaseState::Degraded
        } else {
            LeaseState::Active
        }
    }
}
