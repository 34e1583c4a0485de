use thiserror::Error;

use crate::types::{AlgorithmId, StatusCode, Token};

/// Every failure the leasing engine reports. Each variant maps onto exactly one
/// non-OK [`StatusCode`]; quota exhaustion is not an error and has no variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicsError {
    #[error("unknown error: {0}")]
    Unknown(String),
    #[error("client {0} does not exist")]
    ClientNotExist(Token),
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("algorithm {0} does not exist")]
    AlgorithmNotExist(AlgorithmId),
    #[error("disconnected from license server: {0}")]
    Disconnected(String),
    #[error("duplicate resource: {0}")]
    DuplicateResource(String),
    #[error("resource is not initialized")]
    Uninitialized,
    #[error("invalid parameter: {0}")]
    InvalidParams(String),
}

pub type Result<T> = std::result::Result<T, LicsError>;

impl LicsError {
    pub fn code(&self) -> StatusCode {
        match self {
            LicsError::Unknown(_) => StatusCode::UnknownError,
            LicsError::ClientNotExist(_) => StatusCode::ClientNotExist,
            LicsError::AuthFailure(_) => StatusCode::AuthFailure,
            LicsError::AlgorithmNotExist(_) => StatusCode::AlgorithmNotExist,
            LicsError::Disconnected(_) => StatusCode::NetDisconnected,
            LicsError::DuplicateResource(_) => StatusCode::DuplicateResourceInit,
            LicsError::Uninitialized => StatusCode::UninitializedResource,
            LicsError::InvalidParams(_) => StatusCode::InvalidParams,
        }
    }

    /// Rebuilds an error from a status code carried in a server response.
    /// Returns `None` for `StatusCode::Ok`.
    pub fn from_status(
        status: StatusCode,
        token: Token,
        algorithm_id: AlgorithmId,
    ) -> Option<Self> {
        let err = match status {
            StatusCode::Ok => return None,
            StatusCode::UnknownError => {
                LicsError::Unknown("server reported an unknown error".into())
            }
            StatusCode::ClientNotExist => LicsError::ClientNotExist(token),
            StatusCode::AuthFailure => LicsError::AuthFailure("server rejected the token".into()),
            StatusCode::AlgorithmNotExist => LicsError::AlgorithmNotExist(algorithm_id),
            StatusCode::NetDisconnected => {
                LicsError::Disconnected("server reported disconnect".into())
            }
            StatusCode::DuplicateResourceInit => {
                LicsError::DuplicateResource(format!("algorithm {}", algorithm_id))
            }
            StatusCode::UninitializedResource => LicsError::Uninitialized,
            StatusCode::InvalidParams => {
                LicsError::InvalidParams(format!("request for algorithm {}", algorithm_id))
            }
        };
        Some(err)
    }
}

/// Collapses a result into the status code seen across the process boundary.
pub fn status_of<T>(result: &Result<T>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::Ok,
        Err(e) => e.code(),
    }
}
