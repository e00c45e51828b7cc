use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
    #[error("backend error: {0}")]
    Adapter(#[from] adapters::AdapterError),
    #[error("invalid setting: {0}")]
    Invalid(String),
}
