//! Server-side RPC surface. Transports (the axum server, `LocalTransport`)
//! delegate here; every method takes the ledger lock exactly once.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::ledger::LicenseLedger;
use crate::protocol::*;
use crate::types::{AlgorithmLicensePool, StatusCode, now_ms};

/// Point-in-time view of the server, for health and operator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub client_count: usize,
    pub pools: Vec<AlgorithmLicensePool>,
}

pub struct LicenseService {
    ledger: Mutex<LicenseLedger>,
}

impl LicenseService {
    pub fn new(ledger: LicenseLedger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let ledger = LicenseLedger::with_catalogue(
            config.catalogue.iter().copied(),
            config.eviction_policy(),
        )?;
        Ok(Self::new(ledger))
    }

    /// Runs `f` under the ledger lock. Never call out to slow collaborators from `f`.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&mut LicenseLedger) -> R) -> R {
        f(&mut *self.ledger.lock())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let ledger = self.ledger.lock();
        LedgerSnapshot {
            client_count: ledger.client_count(),
            pools: ledger.pools(),
        }
    }

    pub fn authenticate(&self, req: &AuthenticateRequest) -> AuthenticateResponse {
        let token = self.ledger.lock().authenticate(req.token, now_ms());
        info!(token, "Client authenticated");
        AuthenticateResponse {
            token,
            status: StatusCode::Ok,
        }
    }

    pub fn create_license(&self, req: &CreateLicenseRequest) -> CreateLicenseResponse {
        let outcome = {
            let mut ledger = self.ledger.lock();
            match ledger.check_video_request(req.token, req.algorithm_id, req.task_class) {
                Ok(()) => Ok(ledger.allocate(req.token, req.algorithm_id, req.expected_count)),
                Err(e) => Err(e),
            }
        };

        let (granted_count, status) = settle(outcome);
        debug!(
            token = req.token,
            algorithm_id = req.algorithm_id,
            expected = req.expected_count,
            granted = granted_count,
            %status,
            "License allocation"
        );
        CreateLicenseResponse {
            token: req.token,
            algorithm_id: req.algorithm_id,
            granted_count,
            status,
        }
    }

    pub fn delete_license(&self, req: &DeleteLicenseRequest) -> DeleteLicenseResponse {
        let outcome = {
            let mut ledger = self.ledger.lock();
            match ledger.check_video_request(req.token, req.algorithm_id, req.task_class) {
                Ok(()) => Ok(ledger.free(req.token, req.algorithm_id, req.release_count)),
                Err(e) => Err(e),
            }
        };

        let (released_count, status) = settle(outcome);
        debug!(
            token = req.token,
            algorithm_id = req.algorithm_id,
            requested = req.release_count,
            released = released_count,
            %status,
            "License release"
        );
        DeleteLicenseResponse {
            token: req.token,
            algorithm_id: req.algorithm_id,
            released_count,
            status,
        }
    }

    pub fn heartbeat(&self, req: &HeartbeatRequest) -> HeartbeatResponse {
        self.heartbeat_at(req, now_ms())
    }

    /// `heartbeat` with an explicit clock, for replaying time in tests.
    pub fn heartbeat_at(&self, req: &HeartbeatRequest, now: u64) -> HeartbeatResponse {
        let result = self.ledger.lock().heartbeat(req.token, &req.usage, now);
        match result {
            Ok(shares) => HeartbeatResponse {
                token: req.token,
                shares,
                status: StatusCode::Ok,
            },
            Err(e) => {
                debug!(token = req.token, error = %e, "Heartbeat rejected");
                HeartbeatResponse {
                    token: req.token,
                    shares: Vec::new(),
                    status: e.code(),
                }
            }
        }
    }

    /// Present in the protocol but not backed by state.
    pub fn query_license(&self, _req: &QueryLicenseRequest) -> QueryLicenseResponse {
        QueryLicenseResponse {
            status: StatusCode::Ok,
        }
    }
}

fn settle(outcome: Result<u32>) -> (u32, StatusCode) {
    match outcome {
        Ok(count) => (count, StatusCode::Ok),
        Err(e) => (0, e.code()),
    }
}
