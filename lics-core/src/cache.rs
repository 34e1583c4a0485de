use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::AlgorithmConfig;
use crate::error::{LicsError, Result};
use crate::protocol::{AlgorithmShare, AlgorithmUsage};
use crate::types::{AlgorithmId, StatusCode, TaskClass};

/// Client-side mirror of one configured algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLeaseEntry {
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    /// PICTURE: the last fair share published by the server. VIDEO: unused.
    pub total: u32,
    /// Licenses this process currently holds
    pub used: u32,
    pub per_client_cap: u32,
}

impl ClientLeaseEntry {
    pub fn from_config(config: &AlgorithmConfig) -> Self {
        Self {
            algorithm_id: config.algorithm_id,
            task_class: config.task_class,
            total: 0,
            used: 0,
            per_client_cap: config.per_client_cap,
        }
    }

    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }
}

/// All entries of one client. Entries are created once and never removed.
#[derive(Debug, Clone, Default)]
pub struct LeaseCache {
    entries: HashMap<AlgorithmId, ClientLeaseEntry>,
}

impl LeaseCache {
    pub fn from_config(algorithms: &[AlgorithmConfig]) -> Self {
        Self {
            entries: algorithms
                .iter()
                .map(|a| (a.algorithm_id, ClientLeaseEntry::from_config(a)))
                .collect(),
        }
    }

    pub fn entry(&self, algorithm_id: AlgorithmId) -> Result<&ClientLeaseEntry> {
        self.entries
            .get(&algorithm_id)
            .ok_or(LicsError::AlgorithmNotExist(algorithm_id))
    }

    fn entry_mut(&mut self, algorithm_id: AlgorithmId) -> Result<&mut ClientLeaseEntry> {
        self.entries
            .get_mut(&algorithm_id)
            .ok_or(LicsError::AlgorithmNotExist(algorithm_id))
    }

    pub fn task_class(&self, algorithm_id: AlgorithmId) -> Option<TaskClass> {
        self.entries.get(&algorithm_id).map(|e| e.task_class)
    }

    /// Local PICTURE grant: `min(expected, total - used)`.
    pub fn acquire_picture(&mut self, algorithm_id: AlgorithmId, expected: u32) -> Result<u32> {
        let entry = self.picture_entry(algorithm_id)?;
        let granted = expected.min(entry.available());
        entry.used += granted;
        Ok(granted)
    }

    /// Local PICTURE release; never drops below zero.
    pub fn release_picture(&mut self, algorithm_id: AlgorithmId, amount: u32) -> Result<u32> {
        let entry = self.picture_entry(algorithm_id)?;
        let released = amount.min(entry.used);
        entry.used -= released;
        Ok(released)
    }

    fn picture_entry(&mut self, algorithm_id: AlgorithmId) -> Result<&mut ClientLeaseEntry> {
        let entry = self.entry_mut(algorithm_id)?;
        if entry.task_class != TaskClass::Picture {
            return Err(LicsError::InvalidParams(format!(
                "algorithm {} is not a PICTURE algorithm",
                algorithm_id
            )));
        }
        Ok(entry)
    }

    /// Mirrors a VIDEO grant confirmed by the server.
    pub fn record_video_grant(&mut self, algorithm_id: AlgorithmId, granted: u32) {
        if let Ok(entry) = self.entry_mut(algorithm_id) {
            entry.used = entry.used.saturating_add(granted);
        }
    }

    /// Mirrors a VIDEO release confirmed by the server.
    pub fn record_video_release(&mut self, algorithm_id: AlgorithmId, released: u32) {
        if let Ok(entry) = self.entry_mut(algorithm_id) {
            entry.used = entry.used.saturating_sub(released);
        }
    }

    /// VIDEO grants belong to a token; a new token starts from zero.
    pub fn reset_video_usage(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.task_class == TaskClass::Video {
                entry.used = 0;
            }
        }
    }

    /// Writes published shares into PICTURE totals. Entries with a non-OK
    /// status are skipped. Returns how many entries were updated.
    pub fn apply_shares(&mut self, shares: &[AlgorithmShare]) -> usize {
        let mut applied = 0;
        for share in shares.iter().filter(|s| s.status == StatusCode::Ok) {
            if let Some(entry) = self.entries.get_mut(&share.algorithm_id) {
                if entry.task_class == TaskClass::Picture {
                    entry.total = share.share;
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Every entry, as sent with a heartbeat. Sorted for stable requests.
    pub fn usage_report(&self) -> Vec<AlgorithmUsage> {
        let mut report: Vec<_> = self
            .entries
            .values()
            .map(|e| AlgorithmUsage {
                algorithm_id: e.algorithm_id,
                task_class: e.task_class,
                used: e.used,
                max_limit: e.per_client_cap,
            })
            .collect();
        report.sort_by_key(|u| u.algorithm_id);
        report
    }
}
