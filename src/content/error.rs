use thiserror::Error;

/// Failure talking to the content service.
///
/// Returned by the raw collection fetches. Lookup helpers built on top of
/// them degrade instead of propagating it.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Content service request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Content service error ({status}) for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Failed to reach content service at {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to decode content service response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Timeouts, transport failures, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode { .. } => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}
