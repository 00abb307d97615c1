use thiserror::Error;

/// How a failed inference call should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The model is loading or the router is saturated. Retry with backoff.
    Overloaded,
    /// The request did not complete in time. Retry with a shorter backoff.
    Timeout,
    /// The input itself was refused, usually for length. Bisect or give up.
    InputRejected,
    /// Anything else. Not retried.
    Other,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model overloaded (HTTP {status})")]
    Overloaded { status: u16 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Input rejected (HTTP {status}): {body}")]
    InputRejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl InferenceError {
    /// Map a non-success HTTP status to a typed error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            503 | 529 => InferenceError::Overloaded { status },
            408 | 504 => InferenceError::Timeout(format!("HTTP {status}")),
            400 | 413 | 422 => InferenceError::InputRejected { status, body },
            _ => InferenceError::Api { status, body },
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            InferenceError::Overloaded { .. } => FailureClass::Overloaded,
            // Transport failures (reset connections, DNS hiccups) get the
            // same bounded retry as timeouts.
            InferenceError::Timeout(_) | InferenceError::Network(_) => FailureClass::Timeout,
            InferenceError::InputRejected { .. } => FailureClass::InputRejected,
            InferenceError::Config(_) | InferenceError::Api { .. } | InferenceError::Parse(_) => {
                FailureClass::Other
            }
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout(e.to_string())
        } else {
            InferenceError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(e: serde_json::Error) -> Self {
        InferenceError::Parse(e.to_string())
    }
}
