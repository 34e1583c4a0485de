use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use ::lics_core::client::LicenseClient as RustClient;
use ::lics_core::config::ClientConfig;
use ::lics_core::error::{LicsError, status_of};
use ::lics_core::types::StatusCode;

fn init_error(e: LicsError) -> PyErr {
    PyValueError::new_err(format!("{}: {}", e.code(), e))
}

/// License client for Python.
///
/// Construct it with a JSON config; the background loop authenticates and
/// heartbeats on its own thread. Every call returns a status code, `0` on
/// success. After `shutdown()` all calls return `UNINITIALIZED_RESOURCE`.
#[pyclass(unsendable)]
pub struct LicenseClient {
    inner: Option<RustClient>,
}

#[pymethods]
impl LicenseClient {
    /// Create a client from a JSON config string.
    /// Raises ValueError carrying the status code if the config is rejected.
    #[new]
    pub fn new(config_json: &str) -> PyResult<Self> {
        let config: ClientConfig = serde_json::from_str(config_json)
            .map_err(|e| init_error(LicsError::InvalidParams(e.to_string())))?;
        let inner = RustClient::connect(config).map_err(init_error)?;
        Ok(Self { inner: Some(inner) })
    }

    /// Acquire up to `expected` licenses. Returns `(status, granted)`.
    pub fn acquire(&self, py: Python<'_>, algorithm_id: u32, expected: u32) -> (i32, u32) {
        let Some(client) = &self.inner else {
            return (StatusCode::UninitializedResource.code(), 0);
        };
        let result = py.allow_threads(|| client.acquire(algorithm_id, expected));
        (status_of(&result).code(), result.unwrap_or(0))
    }

    /// Release up to `amount` licenses. Returns the status code.
    pub fn release(&self, py: Python<'_>, algorithm_id: u32, amount: u32) -> i32 {
        let Some(client) = &self.inner else {
            return StatusCode::UninitializedResource.code();
        };
        let result = py.allow_threads(|| client.release(algorithm_id, amount));
        status_of(&result).code()
    }

    /// "VIDEO", "PICTURE", or None when the algorithm is not configured.
    pub fn task_class(&self, algorithm_id: u32) -> Option<String> {
        let client = self.inner.as_ref()?;
        client.task_class(algorithm_id).ok().map(|c| c.to_string())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Block up to `timeout_ms` for the first successful authentication.
    pub fn wait_until_connected(&self, py: Python<'_>, timeout_ms: u64) -> bool {
        let Some(client) = &self.inner else {
            return false;
        };
        py.allow_threads(|| {
            client.wait_until_connected(std::time::Duration::from_millis(timeout_ms))
        })
    }

    /// Stop the background loop. Safe to call twice.
    pub fn shutdown(&mut self, py: Python<'_>) {
        if let Some(client) = self.inner.take() {
            py.allow_threads(move || client.shutdown());
        }
    }
}

/// The lics Python module.
#[pymodule]
fn lics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<LicenseClient>()?;
    for status in StatusCode::ALL {
        m.add(status.name(), status.code())?;
    }
    Ok(())
}
