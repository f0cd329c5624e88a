use std::time::Duration;

/// Failure talking to the shared TTL store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store returned corrupt data: {0}")]
    Corrupt(String),
}

/// Whole seconds for a store TTL: rounded up, never below one.
pub fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}
