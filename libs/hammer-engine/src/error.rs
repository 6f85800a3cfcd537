use hammer_api::{DisruptError, StoreError};

use crate::harness::HarnessState;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    /// Fatal: the run aborts before any task is spawned.
    #[error("schema setup failed: {0}")]
    Schema(StoreError),

    #[error("cannot spawn tasks: {0}")]
    Spawn(String),

    #[error("{operation} is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: HarnessState,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store did not accept the write issued right after the disruption.
    #[error("store unavailable after disruption: {0}")]
    Probe(StoreError),

    #[error(transparent)]
    Disruption(#[from] DisruptError),
}
