//! Static configuration for both sides of the protocol.
//!
//! `ClientConfig` is serde-deserializable so embedders can keep it in a JSON
//! file; `ServerConfig` is assembled by the CLI from flags and env vars.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{LicsError, Result};
use crate::eviction::EvictionPolicy;
use crate::types::{AlgorithmId, TaskClass};

/// One algorithm the client is allowed to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    /// Upper bound on the PICTURE share this client asks for
    #[serde(default = "default_per_client_cap")]
    pub per_client_cap: u32,
}

impl AlgorithmConfig {
    pub fn new(algorithm_id: AlgorithmId, task_class: TaskClass) -> Self {
        Self {
            algorithm_id,
            task_class,
            per_client_cap: default_per_client_cap(),
        }
    }

    pub fn with_cap(mut self, per_client_cap: u32) -> Self {
        self.per_client_cap = per_client_cap;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the license server, e.g. `http://127.0.0.1:3100`
    pub server_url: String,
    pub algorithms: Vec<AlgorithmConfig>,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, algorithms: Vec<AlgorithmConfig>) -> Self {
        Self {
            server_url: server_url.into(),
            algorithms,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial_ms = initial.as_millis() as u64;
        self.backoff_max_ms = max.as_millis() as u64;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.algorithms.is_empty() {
            return Err(LicsError::InvalidParams(
                "at least one algorithm must be configured".to_string(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(LicsError::InvalidParams(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.backoff_initial_ms == 0 || self.backoff_max_ms < self.backoff_initial_ms {
            return Err(LicsError::InvalidParams(
                "backoff_initial_ms must be > 0 and <= backoff_max_ms".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for algo in &self.algorithms {
            if !seen.insert(algo.algorithm_id) {
                return Err(LicsError::DuplicateResource(format!(
                    "algorithm {} configured twice",
                    algo.algorithm_id
                )));
            }
        }
        Ok(())
    }
}

/// Server policy. The defaults are the fixed protocol constants.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub heartbeat_timeout: Duration,
    pub miss_threshold: u32,
    pub reconcile_interval: Duration,
    /// Algorithms the server hands out licenses for
    pub catalogue: Vec<(AlgorithmId, TaskClass)>,
}

impl ServerConfig {
    pub fn new(catalogue: Vec<(AlgorithmId, TaskClass)>) -> Self {
        Self {
            catalogue,
            ..Self::default()
        }
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy::new(self.heartbeat_timeout, self.miss_threshold)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            miss_threshold: 3,
            reconcile_interval: Duration::from_secs(30),
            catalogue: Vec::new(),
        }
    }
}

fn default_per_client_cap() -> u32 {
    u32::MAX
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

fn default_backoff_initial_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    10_000
}
