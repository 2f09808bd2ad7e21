use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpiryError {
    #[error("key not found")]
    NotFound,
    #[error("invalid ttl: {0} seconds")]
    InvalidTtl(f64),
    #[error("invalid poll interval: {0} seconds")]
    InvalidInterval(f64),
    #[error("expiry callback failed: {0}")]
    CallbackFailure(String),
    #[error("reaper already stopped")]
    Stopped,
}

impl ExpiryError {
    /// Turns a panic payload caught around a user callback into a reportable error.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ExpiryError::CallbackFailure(msg)
    }
}
