use domain::interaction::InteractionError;
use model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Interaction error: {0}")]
    InteractionError(#[from] InteractionError),
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
    /// An asynchronous effect gave up. Never returned to the caller of a command.
    #[error("Effect failed: {0}")]
    EffectFailed(String),
    #[error("Unknown error: {0}")]
    UnknownError(String),
}
