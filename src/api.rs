//! Seam between the pipeline and the external comment service.

use thiserror::Error;

/// One page of results from the paged comment listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentPage {
    pub texts: Vec<String>,
    pub next_page_token: Option<String>,
}

/// How the fetch loop reacts to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry the same request with exponential backoff, bounded.
    Transient,
    /// Wait out the cooldown, swap credentials, retry the same request.
    Quota,
    /// Final for this identifier (comments disabled, video missing).
    Rejected,
    Unexpected,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("quota exhausted or key rejected (status {status}): {message}")]
    Quota { status: u16, message: String },

    #[error("rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unexpected API error (status {status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Transient(_) => ErrorClass::Transient,
            ApiError::Quota { .. } => ErrorClass::Quota,
            ApiError::Rejected { .. } => ErrorClass::Rejected,
            ApiError::Malformed(_) | ApiError::Unexpected { .. } | ApiError::Client(_) => {
                ErrorClass::Unexpected
            }
        }
    }
}

/// A client bound to one credential.
pub trait CommentApi: Send {
    fn list_page(
        &self,
        identifier: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<CommentPage, ApiError>;
}

/// Builds clients from credentials. Shared by every worker.
pub trait ApiConnector: Send + Sync {
    type Client: CommentApi;

    fn connect(&self, credential: &str) -> Result<Self::Client, ApiError>;
}
