use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vendor-assigned algorithm identifier.
pub type AlgorithmId = u32;

/// Opaque lease token issued by the server on authentication.
pub type Token = i64;

/// The two classes of licensed work.
///
/// VIDEO licenses are accounted exactly on the server, one request at a time.
/// PICTURE licenses are fair-shared: the server publishes a per-client share on
/// every heartbeat and the client meters against it locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskClass {
    Video,
    Picture,
}

impl std::fmt::Display for TaskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskClass::Video => write!(f, "VIDEO"),
            TaskClass::Picture => write!(f, "PICTURE"),
        }
    }
}

impl FromStr for TaskClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VIDEO" => Ok(TaskClass::Video),
            "PICTURE" => Ok(TaskClass::Picture),
            _ => Err(format!(
                "Invalid task class '{}'. Must be one of: VIDEO, PICTURE",
                s
            )),
        }
    }
}

/// Status codes shared by server and client.
///
/// `Ok` is zero; every failure code sits above [`StatusCode::BASE`] so the
/// space never collides with transport-level codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum StatusCode {
    Ok,
    UnknownError,
    ClientNotExist,
    AuthFailure,
    AlgorithmNotExist,
    NetDisconnected,
    DuplicateResourceInit,
    UninitializedResource,
    InvalidParams,
}

impl StatusCode {
    pub const BASE: i32 = 10000;

    pub const ALL: [StatusCode; 9] = [
        StatusCode::Ok,
        StatusCode::UnknownError,
        StatusCode::ClientNotExist,
        StatusCode::AuthFailure,
        StatusCode::AlgorithmNotExist,
        StatusCode::NetDisconnected,
        StatusCode::DuplicateResourceInit,
        StatusCode::UninitializedResource,
        StatusCode::InvalidParams,
    ];

    /// Numeric value on the wire and across the FFI boundary.
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::UnknownError => Self::BASE + 1,
            StatusCode::ClientNotExist => Self::BASE + 2,
            StatusCode::AuthFailure => Self::BASE + 3,
            StatusCode::AlgorithmNotExist => Self::BASE + 4,
            StatusCode::NetDisconnected => Self::BASE + 5,
            StatusCode::DuplicateResourceInit => Self::BASE + 6,
            StatusCode::UninitializedResource => Self::BASE + 7,
            StatusCode::InvalidParams => Self::BASE + 8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Upper-case name, as used in logs and binding constants.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::UnknownError => "UNKNOWN_ERROR",
            StatusCode::ClientNotExist => "CLIENT_NOT_EXIST",
            StatusCode::AuthFailure => "AUTH_FAILURE",
            StatusCode::AlgorithmNotExist => "ALGORITHM_NOT_EXIST",
            StatusCode::NetDisconnected => "NET_DISCONNECTED",
            StatusCode::DuplicateResourceInit => "DUPLICATE_RESOURCE_INIT",
            StatusCode::UninitializedResource => "UNINITIALIZED_RESOURCE",
            StatusCode::InvalidParams => "INVALID_PARAMS",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

impl From<StatusCode> for i32 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        StatusCode::from_code(code).ok_or_else(|| format!("unknown status code {}", code))
    }
}
