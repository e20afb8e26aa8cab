use crate::api::ApiError;
use crate::settings::SettingsError;
use crate::storage::StorageError;
use crate::theme::ThemeError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to encode command output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write command output: {0}")]
    Io(#[from] std::io::Error),
    #[error("no trash entry with id {0}")]
    TrashEntryNotFound(String),
}
