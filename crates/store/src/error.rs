use std::time::Duration;

/// An error from the underlying object-store driver itself, before the
/// accessor has had a chance to apply rate limiting or NotFound semantics.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The object does not exist. Only ever returned by `get` -- `head`
    /// folds a missing object into `Ok(false)` the way `framework/s3_client.py`'s
    /// `_object_exists` catches a 404 and returns `False` rather than raising.
    #[error("object not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced by the `StoreAccessor` to its callers (the log tailer).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("token acquisition timed out after {0:?}")]
    Busy(Duration),
    #[error("object store backend error: {0}")]
    Backend(#[from] BackendError),
}
