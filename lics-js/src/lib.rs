#![deny(clippy::all)]

use napi::{Error, Status};
use napi_derive::napi;

use lics_core::client::LicenseClient as RustClient;
use lics_core::config::ClientConfig;
use lics_core::error::{LicsError, status_of};
use lics_core::types::StatusCode;

fn init_error(e: LicsError) -> Error {
    Error::new(Status::InvalidArg, format!("{}: {}", e.code(), e))
}

#[napi(object)]
pub struct AcquireResult {
    pub status: i32,
    pub granted: u32,
}

// ─── JS-facing LicenseClient ───────────────────────────────────────────────

#[napi]
pub struct LicenseClient {
    inner: Option<RustClient>,
}

#[napi]
impl LicenseClient {
    /// Create a client from a JSON config string. Throws with the status
    /// code in the message if the config is rejected.
    #[napi(constructor)]
    pub fn new(config_json: String) -> napi::Result<Self> {
        let config: ClientConfig = serde_json::from_str(&config_json)
            .map_err(|e| init_error(LicsError::InvalidParams(e.to_string())))?;
        let inner = RustClient::connect(config).map_err(init_error)?;
        Ok(Self { inner: Some(inner) })
    }

    /// Acquire up to `expected` licenses.
    #[napi]
    pub fn acquire(&self, algorithm_id: u32, expected: u32) -> AcquireResult {
        let Some(client) = &self.inner else {
            return AcquireResult {
                status: StatusCode::UninitializedResource.code(),
                granted: 0,
            };
        };
        let result = client.acquire(algorithm_id, expected);
        AcquireResult {
            status: status_of(&result).code(),
            granted: result.unwrap_or(0),
        }
    }

    /// Release up to `amount` licenses. Returns the status code.
    #[napi]
    pub fn release(&self, algorithm_id: u32, amount: u32) -> i32 {
        match &self.inner {
            Some(client) => status_of(&client.release(algorithm_id, amount)).code(),
            None => StatusCode::UninitializedResource.code(),
        }
    }

    /// "VIDEO", "PICTURE", or null when the algorithm is not configured.
    #[napi]
    pub fn task_class(&self, algorithm_id: u32) -> Option<String> {
        let client = self.inner.as_ref()?;
        client.task_class(algorithm_id).ok().map(|c| c.to_string())
    }

    #[napi]
    pub fn is_connected(&self) -> bool {
        self.inner.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Stop the background loop. Safe to call twice.
    #[napi]
    pub fn shutdown(&mut self) {
        if let Some(client) = self.inner.take() {
            client.shutdown();
        }
    }
}

/// Name of a status code, e.g. `statusName(10005) === "NET_DISCONNECTED"`.
#[napi]
pub fn status_name(code: i32) -> Option<String> {
    StatusCode::from_code(code).map(|s| s.name().to_string())
}
