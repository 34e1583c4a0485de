use std::time::Duration;

use crate::types::{ClientLease, LeaseState};

/// Outcome of judging one lease during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepVerdict {
    /// Heartbeat seen inside the timeout window
    Alive,
    /// Heartbeat overdue; the miss counter was bumped to `missed`
    Missed { missed: u32 },
    /// Miss threshold reached; the caller must reclaim and delete the lease
    Expired,
}

/// Decides lease liveness from the time since its last heartbeat.
///
/// Pure policy: it mutates only the miss counter of the lease it is handed and
/// never touches pools. Reclaiming is the ledger's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub heartbeat_timeout_ms: u64,
    pub miss_threshold: u32,
}

impl EvictionPolicy {
    pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MISS_THRESHOLD: u32 = 3;

    pub fn new(heartbeat_timeout: Duration, miss_threshold: u32) -> Self {
        Self {
            heartbeat_timeout_ms: heartbeat_timeout.as_millis() as u64,
            miss_threshold: miss_threshold.max(1),
        }
    }

    /// True once more than one timeout window has passed since the last heartbeat.
    pub fn is_overdue(&self, lease: &ClientLease, now: u64) -> bool {
        now.saturating_sub(lease.last_heartbeat_at) > self.heartbeat_timeout_ms
    }

    /// Applies one sweep to `lease`.
    pub fn judge(&self, lease: &mut ClientLease, now: u64) -> SweepVerdict {
        if !self.is_overdue(lease, now) {
            return SweepVerdict::Alive;
        }

        lease.missed_heartbeats = lease.missed_heartbeats.saturating_add(1);
        match lease.state(self.miss_threshold) {
            LeaseState::Expired => SweepVerdict::Expired,
            _ => SweepVerdict::Missed {
                missed: lease.missed_heartbeats,
            },
        }
    }

    pub fn state_of(&self, lease: &ClientLease) -> LeaseState {
        lease.state(self.miss_threshold)
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HEARTBEAT_TIMEOUT, Self::DEFAULT_MISS_THRESHOLD)
    }
}
