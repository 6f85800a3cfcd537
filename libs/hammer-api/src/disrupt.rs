use crate::store::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("disruption '{target}' failed: {detail}")]
pub struct DisruptError {
    pub target: String,
    pub detail: String,
}

impl DisruptError {
    pub fn new(target: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { target: target.into(), detail: detail.into() }
    }
}

/// Out-of-band operation that removes or restarts the primary node.
///
/// Opaque to the caller: latency is unspecified and the store may or may not
/// be reachable when the future resolves.
pub trait Disruptor: Send + Sync {
    fn disrupt(&self) -> BoxFuture<'_, Result<(), DisruptError>>;

    /// What gets disrupted, for logs.
    fn describe(&self) -> String;
}
