#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(String),

    #[error("store: {0}")]
    Store(#[from] hammer_api::StoreError),

    #[error("{0}")]
    Engine(#[from] hammer_engine::EngineError),
}
