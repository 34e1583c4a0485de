//! Blocking JSON-over-HTTP transport, matching the routes served by `lics serve`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::{LicsError, Result};
use crate::protocol::*;
use crate::transport::LicenseTransport;

pub const AUTH_PATH: &str = "/v1/auth";
pub const CREATE_PATH: &str = "/v1/licenses";
pub const RELEASE_PATH: &str = "/v1/licenses/release";
pub const HEARTBEAT_PATH: &str = "/v1/heartbeat";
pub const QUERY_PATH: &str = "/v1/query";

pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn post<Req: Serialize, Resp: DeserializeOwned>(&self, path: &str, body: &Req) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.agent.post(&url).send_json(body).map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                LicsError::Unknown(format!("{} answered HTTP {}", url, code))
            }
            ureq::Error::Transport(t) => LicsError::Disconnected(t.to_string()),
        })?;
        response
            .into_json::<Resp>()
            .map_err(|e| LicsError::Unknown(format!("malformed response from {}: {}", url, e)))
    }
}

impl LicenseTransport for HttpTransport {
    fn authenticate(&self, req: &AuthenticateRequest) -> Result<AuthenticateResponse> {
        self.post(AUTH_PATH, req)
    }

    fn create_license(&self, req: &CreateLicenseRequest) -> Result<CreateLicenseResponse> {
        self.post(CREATE_PATH, req)
    }

    fn delete_license(&self, req: &DeleteLicenseRequest) -> Result<DeleteLicenseResponse> {
        self.post(RELEASE_PATH, req)
    }

    fn heartbeat(&self, req: &HeartbeatRequest) -> Result<HeartbeatResponse> {
        self.post(HEARTBEAT_PATH, req)
    }

    fn query_license(&self, req: &QueryLicenseRequest) -> Result<QueryLicenseResponse> {
        self.post(QUERY_PATH, req)
    }
}
