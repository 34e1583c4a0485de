//! HTTP-backed QuotaSource.
//!
//! Enable with the `http` feature flag:
//! ```toml
//! lics-core = { path = "../lics-core", features = ["http"] }
//! ```
//!
//! Wire contract with the quota authority:
//! - `GET  {base}/quota` answers `{"<algorithm id>": total, ...}`
//! - `POST {base}/usage` takes `{"<algorithm id>": used, ...}`

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{LicsError, Result};
use crate::infrastructure::QuotaSource;
use crate::types::AlgorithmId;

pub struct HttpQuotaSource {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpQuotaSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl QuotaSource for HttpQuotaSource {
    fn fetch_total_quota(&mut self) -> Result<HashMap<AlgorithmId, u32>> {
        let url = self.url("/quota");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| LicsError::Unknown(format!("GET {} failed: {}", url, e)))?;
        response
            .into_json::<HashMap<AlgorithmId, u32>>()
            .map_err(|e| LicsError::Unknown(format!("malformed quota from {}: {}", url, e)))
    }

    fn push_used_quota(&mut self, used: &HashMap<AlgorithmId, u32>) -> Result<()> {
        let url = self.url("/usage");
        self.agent
            .post(&url)
            .send_json(used)
            .map_err(|e| LicsError::Unknown(format!("POST {} failed: {}", url, e)))?;
        Ok(())
    }
}
