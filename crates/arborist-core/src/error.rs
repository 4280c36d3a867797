use std::path::PathBuf;

/// Error taxonomy shared across the kernel. Each crate defines its own
/// narrower error enum; this one is the superset used at the CLI boundary to
/// pick an exit code, per the `E_*` table.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("spec error in {file}:{line}: {reason}")]
    Spec {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Machine-readable code printed on the first stderr line per spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Spec { .. } => "E_SPEC",
            CoreError::Config(_) => "E_CONFIG",
            CoreError::Io(_) => "E_INTERNAL",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
