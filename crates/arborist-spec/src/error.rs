use std::path::PathBuf;

/// Carries file, line, and reason per spec §4.3.
#[derive(Debug, thiserror::Error)]
#[error("{file}:{line}: {reason}")]
pub struct SpecError {
    pub file: PathBuf,
    pub line: usize,
    pub reason: String,
}

pub type SpecResult<T> = Result<T, SpecError>;
