use crate::transport::RawResult;
use crate::types::{CollectionResult, Entity};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("CMS API error: {status} {status_text}")]
    Http { status: u16, status_text: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CmsResult<T> = Result<T, CmsError>;

impl CmsError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Transport never reached the backend.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Splits a transport outcome into its body or the matching error.
    pub fn check(raw: RawResult) -> CmsResult<(u16, String)> {
        match raw {
            RawResult::Success { status, body } => Ok((status, body)),
            RawResult::HttpError {
                status,
                status_text,
            } => Err(Self::Http {
                status,
                status_text,
            }),
            RawResult::NetworkError { cause } => Err(Self::Network { message: cause }),
        }
    }
}

/// Read operations shared by the live client and the fallback dataset.
#[async_trait]
pub trait ContentProvider<E: Entity>: Send + Sync {
    async fn get_all(&self) -> CmsResult<CollectionResult<E>>;

    async fn get_featured(&self, limit: u32) -> CmsResult<CollectionResult<E>>;

    /// Exact, case-sensitive match. No match is `Ok(None)`, never an error.
    async fn get_by_slug(&self, slug: &str) -> CmsResult<Option<E>>;

    fn provider_name(&self) -> &'static str;
}
