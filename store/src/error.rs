use thiserror::Error;

/// All `Store` lookups return this distinguished `NotFound` variant (not a
/// bare `None`) when no record matches, per the persistence contract.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("store backend error: {0}")]
    Backend(#[from] tokio_postgres::Error),

    #[error("store pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("store error: {0}")]
    Other(String),
}
