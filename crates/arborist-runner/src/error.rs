#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("runner process failed to launch: {0}")]
    Launch(#[from] std::io::Error),

    #[error("unknown runner id: {0}")]
    UnknownRunner(String),
}

pub type RunnerErrorResult<T> = Result<T, RunnerError>;
