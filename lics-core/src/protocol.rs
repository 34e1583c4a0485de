//! Request/response pairs of the leasing protocol.
//!
//! Every response carries a [`StatusCode`]; transports deliver these bodies
//! verbatim and never translate a logical failure into a transport failure.

use serde::{Deserialize, Serialize};

use crate::types::{AlgorithmId, StatusCode, TaskClass, Token};

// ─── Authenticate ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    /// Token from a previous session, if any. Only logged; a new token is always issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub token: Token,
    pub status: StatusCode,
}

// ─── Create / Delete ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLicenseRequest {
    pub token: Token,
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    pub expected_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLicenseResponse {
    pub token: Token,
    pub algorithm_id: AlgorithmId,
    pub granted_count: u32,
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLicenseRequest {
    pub token: Token,
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    pub release_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLicenseResponse {
    pub token: Token,
    pub algorithm_id: AlgorithmId,
    pub released_count: u32,
    pub status: StatusCode,
}

// ─── Heartbeat ──────────────────────────────────────────────────────────────

/// One cache entry as reported by a client on every heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmUsage {
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    pub used: u32,
    /// The client's self-declared cap on its PICTURE share
    pub max_limit: u32,
}

/// Fair share published for one PICTURE algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmShare {
    pub algorithm_id: AlgorithmId,
    pub share: u32,
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub token: Token,
    #[serde(default)]
    pub usage: Vec<AlgorithmUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub token: Token,
    #[serde(default)]
    pub shares: Vec<AlgorithmShare>,
    pub status: StatusCode,
}

// ─── Query ──────────────────────────────────────────────────────────────────

/// Placeholder in the protocol: the server answers `Ok` and reports nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLicenseRequest {
    #[serde(default)]
    pub token: Token,
    #[serde(default)]
    pub algorithm_id: AlgorithmId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLicenseResponse {
    pub status: StatusCode,
}
