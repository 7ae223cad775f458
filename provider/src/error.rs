use thiserror::Error;

/// Every `CloudProvider` call may fail with a transient/permanent error; a
/// `NotFound` variant is distinguishable from a generic failure so pollers
/// can treat upstream 404s as authoritative deletion.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found")]
    NotFound,

    #[error("cloud provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("cloud provider error: {0}")]
    Other(String),
}
