use thiserror::Error;

/// Errors raised at the limiter's call boundary.
///
/// Running out of tokens is not an error: `try_consume` reports it as `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LimiterError {
    /// Non-positive or non-finite capacity/rate, or an unusable config value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A request the bucket can never satisfy, e.g. a non-positive token count.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LimiterError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, LimiterError::Configuration(_))
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, LimiterError::InvalidRequest(_))
    }
}

impl From<validator::ValidationErrors> for LimiterError {
    fn from(err: validator::ValidationErrors) -> Self {
        LimiterError::Configuration(err.to_string())
    }
}

pub type LimiterResult<T> = Result<T, LimiterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LimiterError::Configuration("capacity must be greater than 0".to_string());
        assert_eq!(err.to_string(), "Configuration error: capacity must be greater than 0");

        let err = LimiterError::InvalidRequest("tokens must be greater than 0".to_string());
        assert_eq!(err.to_string(), "Invalid request: tokens must be greater than 0");
    }

    #[test]
    fn test_error_kind_helpers() {
        assert!(LimiterError::Configuration(String::new()).is_configuration());
        assert!(!LimiterError::Configuration(String::new()).is_invalid_request());
        assert!(LimiterError::InvalidRequest(String::new()).is_invalid_request());
    }
}
