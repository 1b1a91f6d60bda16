/// Failure raised by the authenticated API client.
///
/// `Status` keeps the upstream body verbatim so callers can tell a rate limit
/// from a missing resource or a validation failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("GraphQL request failed: {0}")]
    GraphQl(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timeout: {0}")]
    Timeout(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Timeout(value.to_string());
        }
        if value.is_builder() {
            return Self::InvalidRequest(value.to_string());
        }
        Self::Transport(value.to_string())
    }
}
