use thiserror::Error;

/// Errors surfaced by the transport client.
///
/// `Unauthorized` doubles as a signal that the persisted session has already
/// been cleared by the client as a side effect; callers must not assume the
/// session survives a failed call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Your session has expired. Please sign in again.")]
    Unauthorized,

    #[error("You do not have permission to perform this action.")]
    Forbidden,

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response from server: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Server response did not include the expected data")]
    MissingData,
}

impl ApiError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
