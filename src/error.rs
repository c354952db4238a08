use thiserror::Error;

/// Failure modes of identity lookups and site probes.
#[derive(Debug, Error)]
pub enum LookupError {
    /// DNS, connect, TLS or deadline failure.
    #[error("request failed: {0}")]
    Transport(String),
    /// An identity provider answered with something other than 200.
    #[error("provider returned status {0}")]
    HttpStatus(u16),
    /// Malformed JSON, or a text body with fewer than 2 usable lines.
    #[error("cannot parse response: {0}")]
    Parse(String),
    /// Static configuration defect, e.g. an unknown provider format tag.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Every provider failed; only the last provider's failure is kept.
    #[error("all identity providers failed: {0}")]
    Exhausted(Box<LookupError>),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Parse(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for LookupError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LookupError::Transport("deadline exceeded".to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exhausted_carries_last_message() {
        let err = LookupError::Exhausted(Box::new(LookupError::HttpStatus(503)));
        assert_eq!(err.to_string(), "all identity providers failed: provider returned status 503");
    }
}
