use serde::{Deserialize, Serialize};

use lics_core::types::{AlgorithmId, AlgorithmLicensePool, TaskClass};

// ─── Flag Parsing ───────────────────────────────────────────────────────────

/// Parses a catalogue entry of the form `ID=CLASS`, e.g. `100=VIDEO`.
pub fn parse_algorithm(entry: &str) -> Result<(AlgorithmId, TaskClass), String> {
    let (id, class) = split_pair(entry, "ID=CLASS")?;
    let algorithm_id = parse_algorithm_id(id)?;
    let task_class = class.parse::<TaskClass>()?;
    Ok((algorithm_id, task_class))
}

/// Parses a static quota of the form `ID=TOTAL`, e.g. `100=5000`.
pub fn parse_quota(entry: &str) -> Result<(AlgorithmId, u32), String> {
    let (id, total) = split_pair(entry, "ID=TOTAL")?;
    let algorithm_id = parse_algorithm_id(id)?;
    let total = total
        .parse::<u32>()
        .map_err(|_| format!("Invalid quota total '{}' in '{}'", total, entry))?;
    Ok((algorithm_id, total))
}

fn split_pair<'a>(entry: &'a str, shape: &str) -> Result<(&'a str, &'a str), String> {
    entry
        .split_once('=')
        .map(|(a, b)| (a.trim(), b.trim()))
        .filter(|(a, b)| !a.is_empty() && !b.is_empty())
        .ok_or_else(|| format!("Invalid entry '{}'. Expected {}", entry, shape))
}

fn parse_algorithm_id(id: &str) -> Result<AlgorithmId, String> {
    id.parse::<AlgorithmId>()
        .map_err(|_| format!("Invalid algorithm id '{}'. Must be a non-negative integer", id))
}

// ─── Response Types ─────────────────────────────────────────────────────────

/// Envelope for operator endpoints. RPC routes answer with the protocol
/// bodies directly.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub client_count: usize,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct PoolInfo {
    pub algorithm_id: AlgorithmId,
    pub task_class: TaskClass,
    pub total: u32,
    pub used: u32,
    pub available: u32,
}

impl From<&AlgorithmLicensePool> for PoolInfo {
    fn from(pool: &AlgorithmLicensePool) -> Self {
        Self {
            algorithm_id: pool.algorithm_id,
            task_class: pool.task_class,
            total: pool.total,
            used: pool.used,
            available: pool.available(),
        }
    }
}

#[derive(Serialize)]
pub struct PoolsResponse {
    pub client_count: usize,
    pub pools: Vec<PoolInfo>,
}
