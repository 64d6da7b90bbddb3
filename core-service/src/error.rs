use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::RuntimeError),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Request failed: {0}")]
    Api(#[from] core_auth::ApiError),

    #[error(transparent)]
    Action(#[from] core_quiz::ActionError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
