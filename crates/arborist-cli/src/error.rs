//! Top-level error type for the `arborist` binary. Library crates never
//! know about exit codes (spec §7); this is the only place a `VcsError`,
//! `SpecError`, or `GardenerError` is mapped onto one of the `E_*` strings
//! printed on the first stderr line.

use arborist_core::config::ConfigError;
use arborist_core::model::TreeError;
use arborist_gardener::GardenerError;
use arborist_spec::SpecError;
use arborist_vcs::VcsError;

#[derive(Debug, thiserror::Error)]
pub enum ArboristError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Gardener(#[from] GardenerError),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize task tree snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl ArboristError {
    /// Machine-readable code printed on the first stderr line, per spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            ArboristError::Spec(_) => "E_SPEC",
            ArboristError::Tree(_) => "E_SPEC",
            ArboristError::Vcs(_) => "E_VCS",
            ArboristError::Gardener(e) => e.code(),
            ArboristError::ConfigFile(_) => "E_CONFIG",
            ArboristError::Config(_) => "E_CONFIG",
            ArboristError::Io(_) => "E_INTERNAL",
            ArboristError::Snapshot(_) => "E_INTERNAL",
        }
    }
}

pub type ArboristResult<T> = Result<T, ArboristError>;
