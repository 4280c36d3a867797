use std::path::PathBuf;

/// Failure semantics per spec §4.1: every operation returns success or an
/// error carrying the operation name, backend exit code, and captured
/// stderr. The adapter never retries; the controller classifies
/// [`VcsError::is_transient`] to decide whether *it* should.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("not a repository: {0}")]
    NotARepo(PathBuf),

    #[error("git binary not found on PATH")]
    MissingBinary,

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("{op} failed (exit {code}): {stderr}")]
    Command {
        op: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("libgit2 error: {0}")]
    Git2(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VcsError {
    /// Transient errors (lock contention) may be retried with bounded
    /// backoff within a single step; everything else is fatal to the loop.
    pub fn is_transient(&self) -> bool {
        match self {
            VcsError::Command { stderr, .. } => {
                stderr.contains("index.lock") || stderr.contains("unable to create")
            }
            _ => false,
        }
    }
}

pub type VcsResult<T> = Result<T, VcsError>;
