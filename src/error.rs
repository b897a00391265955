//! Error taxonomy for the extraction pipeline
//!
//! Every failure surfaced to a caller is one of these variants; raw driver
//! diagnostics never leave the crate.

use thiserror::Error;

/// Coarse status category associated with each error, for callers that map
/// errors onto a transport (HTTP status codes, exit codes, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    QuotaExceeded,
    BadInput,
    NotFoundUpstream,
    ServerError,
}

/// Failure modes of a single extraction request.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Usage limit reached. Please create an account to continue.")]
    QuotaExceeded,

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("The domain name could not be found. Please check the URL.")]
    UpstreamUnreachable,

    #[error("The page did not finish loading in time.")]
    RenderTimeout,

    #[error("Could not extract any assets. The site may be protected or empty.")]
    NoAssetsFound,

    #[error("An unexpected server error occurred: {0}")]
    Internal(String),
}

impl ExtractError {
    pub fn status(&self) -> StatusCategory {
        match self {
            ExtractError::QuotaExceeded => StatusCategory::QuotaExceeded,
            ExtractError::InvalidInput(_) => StatusCategory::BadInput,
            ExtractError::UpstreamUnreachable => StatusCategory::NotFoundUpstream,
            ExtractError::RenderTimeout
            | ExtractError::NoAssetsFound
            | ExtractError::Internal(_) => StatusCategory::ServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ExtractError::QuotaExceeded.status(), StatusCategory::QuotaExceeded);
        assert_eq!(
            ExtractError::InvalidInput("missing url".into()).status(),
            StatusCategory::BadInput
        );
        assert_eq!(
            ExtractError::UpstreamUnreachable.status(),
            StatusCategory::NotFoundUpstream
        );
        assert_eq!(ExtractError::RenderTimeout.status(), StatusCategory::ServerError);
        assert_eq!(ExtractError::NoAssetsFound.status(), StatusCategory::ServerError);
    }

    #[test]
    fn test_messages_are_user_facing() {
        // No internal diagnostics in the quota/not-found messages
        let msg = ExtractError::UpstreamUnreachable.to_string();
        assert!(msg.contains("domain name"));
        assert!(!msg.contains("ERR_NAME_NOT_RESOLVED"));
    }
}
