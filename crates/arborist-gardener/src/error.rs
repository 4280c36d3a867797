use arborist_core::model::TaskId;
use arborist_vcs::VcsError;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeConflict {
    #[error("branch {branch} for task {id} exists but diverges from its expected parent tip")]
    Diverged { id: TaskId, branch: String },
    #[error("task {id}: structural spec change ({reason}); re-run build --force to proceed")]
    StructuralChange { id: TaskId, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GardenerError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Materialize(#[from] MaterializeConflict),

    #[error("runner invocation produced no usable output for task {0}")]
    EmptyRunnerOutput(TaskId),

    #[error("test command not found: {0}")]
    TestCommandNotFound(String),

    #[error("stall: no ready leaf exists and the spec is not complete\n{0}")]
    Stall(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl GardenerError {
    /// Machine-readable code printed on the first stderr line, per spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            GardenerError::Vcs(e) if e.is_transient() => "E_VCS",
            GardenerError::Vcs(_) => "E_VCS",
            GardenerError::Materialize(_) => "E_SPEC",
            GardenerError::EmptyRunnerOutput(_) => "E_RUNNER",
            GardenerError::TestCommandNotFound(_) => "E_CONFIG",
            GardenerError::Stall(_) => "E_STALL",
            GardenerError::Internal(_) => "E_INTERNAL",
            GardenerError::Io(_) => "E_INTERNAL",
        }
    }
}

pub type GardenerResult<T> = Result<T, GardenerError>;
