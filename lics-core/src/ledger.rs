//! The server's allocation ledger and lease registry.
//!
//! Pools and leases live in one struct on purpose: every VIDEO allocation,
//! free and eviction touches a pool *and* a lease, and the caller holds a
//! single lock around the whole ledger. For every VIDEO pool,
//! `pool.used == sum(lease.per_algorithm_usage[pool])` holds between calls.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{LicsError, Result};
use crate::eviction::{EvictionPolicy, SweepVerdict};
use crate::fair_share::FairShareAllocator;
use crate::protocol::{AlgorithmShare, AlgorithmUsage};
use crate::types::{
    AlgorithmId, AlgorithmLicensePool, ClientLease, StatusCode, TaskClass, Token,
};

pub struct LicenseLedger {
    // Map of Algorithm ID -> Pool
    pools: HashMap<AlgorithmId, AlgorithmLicensePool>,
    // Map of Token -> Lease
    leases: HashMap<Token, ClientLease>,
    policy: EvictionPolicy,
    last_token: Token,
}

impl LicenseLedger {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            pools: HashMap::new(),
            leases: HashMap::new(),
            policy,
            last_token: 0,
        }
    }

    /// Builds a ledger with one empty pool per catalogue entry.
    pub fn with_catalogue(
        catalogue: impl IntoIterator<Item = (AlgorithmId, TaskClass)>,
        policy: EvictionPolicy,
    ) -> Result<Self> {
        let mut ledger = Self::new(policy);
        for (algorithm_id, task_class) in catalogue {
            ledger.register_pool(AlgorithmLicensePool::new(algorithm_id, task_class))?;
        }
        Ok(ledger)
    }

    pub fn register_pool(&mut self, pool: AlgorithmLicensePool) -> Result<()> {
        if self.pools.contains_key(&pool.algorithm_id) {
            return Err(LicsError::DuplicateResource(format!(
                "pool for algorithm {} already registered",
                pool.algorithm_id
            )));
        }
        self.pools.insert(pool.algorithm_id, pool);
        Ok(())
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn pool(&self, algorithm_id: AlgorithmId) -> Option<&AlgorithmLicensePool> {
        self.pools.get(&algorithm_id)
    }

    /// Pools sorted by algorithm id.
    pub fn pools(&self) -> Vec<AlgorithmLicensePool> {
        let mut pools: Vec<_> = self.pools.values().cloned().collect();
        pools.sort_by_key(|p| p.algorithm_id);
        pools
    }

    pub fn lease(&self, token: Token) -> Option<&ClientLease> {
        self.leases.get(&token)
    }

    pub fn client_count(&self) -> usize {
        self.leases.len()
    }

    // ─── Lease registry ─────────────────────────────────────────────────────

    /// Always issues a fresh token. A resurfacing `previous` token is only noted.
    pub fn authenticate(&mut self, previous: Option<Token>, now: u64) -> Token {
        if let Some(prev) = previous {
            if self.leases.contains_key(&prev) {
                info!(token = prev, "Client re-authenticating while its lease is still registered");
            }
        }

        self.last_token += 1;
        let token = self.last_token;
        self.leases.insert(token, ClientLease::new(token, now));
        token
    }

    /// Refreshes liveness and computes the PICTURE fair shares for the reported
    /// algorithms. VIDEO entries are ignored: the ledger is authoritative for them.
    pub fn heartbeat(
        &mut self,
        token: Token,
        reports: &[AlgorithmUsage],
        now: u64,
    ) -> Result<Vec<AlgorithmShare>> {
        let lease = self
            .leases
            .get_mut(&token)
            .ok_or(LicsError::ClientNotExist(token))?;
        lease.touch(now);

        for report in reports {
            if report.task_class != TaskClass::Picture {
                continue;
            }
            let is_picture_pool = self
                .pools
                .get(&report.algorithm_id)
                .is_some_and(|p| p.task_class == TaskClass::Picture);
            if is_picture_pool {
                lease.picture_reports.insert(report.algorithm_id, report.used);
            }
        }

        let shares = reports
            .iter()
            .filter(|r| r.task_class == TaskClass::Picture)
            .map(|r| self.picture_share(r))
            .collect();
        Ok(shares)
    }

    fn picture_share(&self, report: &AlgorithmUsage) -> AlgorithmShare {
        let (share, status) = match self.pools.get(&report.algorithm_id) {
            None => {
                warn!(
                    algorithm_id = report.algorithm_id,
                    "Heartbeat reported an unknown picture algorithm"
                );
                (0, StatusCode::AlgorithmNotExist)
            }
            Some(pool) if pool.task_class != TaskClass::Picture => {
                (0, StatusCode::InvalidParams)
            }
            Some(pool) => {
                let competing = self.picture_clients(report.algorithm_id);
                (
                    FairShareAllocator::share(pool.total, competing, report.max_limit),
                    StatusCode::Ok,
                )
            }
        };
        AlgorithmShare {
            algorithm_id: report.algorithm_id,
            share,
            status,
        }
    }

    /// Registered leases that have ever reported usage of `algorithm_id`.
    pub fn picture_clients(&self, algorithm_id: AlgorithmId) -> usize {
        self.leases
            .values()
            .filter(|l| l.has_reported(algorithm_id))
            .count()
    }

    /// One eviction pass. Overdue leases collect a miss; leases reaching the
    /// threshold are deleted and their VIDEO usage returned to the pools.
    /// Returns the evicted tokens.
    pub fn sweep(&mut self, now: u64) -> Vec<Token> {
        let policy = self.policy;
        let mut expired = Vec::new();
        for lease in self.leases.values_mut() {
            match policy.judge(lease, now) {
                SweepVerdict::Alive => {}
                SweepVerdict::Missed { missed } => {
                    debug!(token = lease.token, missed, "Heartbeat overdue");
                }
                SweepVerdict::Expired => expired.push(lease.token),
            }
        }

        for token in &expired {
            if let Some(lease) = self.leases.remove(token) {
                let mut reclaimed = 0u64;
                for (algorithm_id, usage) in lease.per_algorithm_usage {
                    if let Some(pool) = self.pools.get_mut(&algorithm_id) {
                        reclaimed += u64::from(pool.reclaim(usage));
                    }
                }
                info!(token = *token, reclaimed, "Lease expired and evicted");
            }
        }
        expired
    }

    // ─── Allocation ─────────────────────────────────────────────────────────

    /// Grants `min(requested, total - used)` VIDEO licenses to `token`.
    /// Unknown token, unknown algorithm or a PICTURE pool yields 0.
    pub fn allocate(&mut self, token: Token, algorithm_id: AlgorithmId, requested: u32) -> u32 {
        let Some(lease) = self.leases.get_mut(&token) else {
            return 0;
        };
        let Some(pool) = self.pools.get_mut(&algorithm_id) else {
            return 0;
        };
        if pool.task_class != TaskClass::Video {
            return 0;
        }

        let granted = pool.grant(requested);
        lease.add_usage(algorithm_id, granted);
        granted
    }

    /// Returns up to `requested` VIDEO licenses held by `token`.
    /// Clamped by both the pool's usage and the lease's own usage.
    pub fn free(&mut self, token: Token, algorithm_id: AlgorithmId, requested: u32) -> u32 {
        let Some(lease) = self.leases.get_mut(&token) else {
            return 0;
        };
        let Some(pool) = self.pools.get_mut(&algorithm_id) else {
            return 0;
        };
        if pool.task_class != TaskClass::Video {
            return 0;
        }

        let released = pool.reclaim(requested.min(lease.usage(algorithm_id)));
        lease.sub_usage(algorithm_id, released);
        released
    }

    /// `(total, used)` of a pool, if both the lease and the pool exist.
    pub fn query(&self, token: Token, algorithm_id: AlgorithmId) -> Option<(u32, u32)> {
        if !self.leases.contains_key(&token) {
            return None;
        }
        self.pools.get(&algorithm_id).map(|p| (p.total, p.used))
    }

    /// Turns the silent-zero outcomes of `allocate`/`free` into status codes.
    pub fn check_video_request(
        &self,
        token: Token,
        algorithm_id: AlgorithmId,
        task_class: TaskClass,
    ) -> Result<()> {
        if !self.leases.contains_key(&token) {
            return Err(LicsError::ClientNotExist(token));
        }
        let pool = self
            .pools
            .get(&algorithm_id)
            .ok_or(LicsError::AlgorithmNotExist(algorithm_id))?;
        if task_class != TaskClass::Video || pool.task_class != TaskClass::Video {
            return Err(LicsError::InvalidParams(format!(
                "algorithm {} is a {} algorithm, request said {}",
                algorithm_id, pool.task_class, task_class
            )));
        }
        Ok(())
    }

    // ─── Quota reconciliation ───────────────────────────────────────────────

    /// Merges fetched totals into known pools. Returns how many pools changed.
    pub fn merge_quota(&mut self, totals: &HashMap<AlgorithmId, u32>) -> usize {
        let mut changed = 0;
        for (algorithm_id, fetched) in totals {
            let Some(pool) = self.pools.get_mut(algorithm_id) else {
                warn!(
                    algorithm_id = *algorithm_id,
                    "Quota source reported an algorithm outside the catalogue"
                );
                continue;
            };
            let before = pool.total;
            let applied = pool.apply_total(*fetched);
            if applied != *fetched {
                warn!(
                    algorithm_id = *algorithm_id,
                    fetched = *fetched,
                    used = pool.used,
                    "Fetched quota is below outstanding usage; holding total at usage"
                );
            }
            if applied != before {
                changed += 1;
            }
        }
        changed
    }

    /// Aggregate used count per algorithm, as pushed to the quota source.
    pub fn used_quota(&self) -> HashMap<AlgorithmId, u32> {
        self.pools
            .values()
            .map(|p| (p.algorithm_id, p.used))
            .collect()
    }
}

impl Default for LicenseLedger {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}
