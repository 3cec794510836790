use thiserror::Error;
use viewtrend_db::DbError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("snapshot store error: {0}")]
    Store(#[from] DbError),
}
