//! Step Executors, per spec §4.8: each is an atomic unit from the outside --
//! it either appends exactly one step commit with full trailers, or
//! surfaces a fatal error and appends nothing.

pub mod implement;
pub mod review;
pub mod test;
pub mod test_parse;

use crate::shutdown::ShutdownSignal;
use arborist_core::config::ArboristConfig;
use arborist_runner::RunnerAdapter;
use arborist_vcs::VcsAdapter;
use std::path::Path;

/// A step's outcome. `Interrupted` is distinct from `Failure`: it does not
/// count toward the retry cap and the caller writes no commit for it --
/// the cancellation arrived after the subprocess exited but the executor
/// chose not to record a step that was never meant to run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
    Interrupted,
}

/// Bundles the collaborators every step executor needs, so none of them has
/// to thread four separate parameters through every call.
pub struct Executors<'a> {
    pub vcs: &'a dyn VcsAdapter,
    pub runner: &'a dyn RunnerAdapter,
    pub repo_path: &'a Path,
    pub config: &'a ArboristConfig,
    cancel: Option<ShutdownSignal>,
}

impl<'a> Executors<'a> {
    pub fn new(
        vcs: &'a dyn VcsAdapter,
        runner: &'a dyn RunnerAdapter,
        repo_path: &'a Path,
        config: &'a ArboristConfig,
    ) -> Self {
        Self {
            vcs,
            runner,
            repo_path,
            config,
            cancel: None,
        }
    }

    /// `ShutdownSignal` is an `Arc<AtomicBool>` handle, so this takes an
    /// owned clone rather than borrowing -- the executors outlive the
    /// controller's per-iteration borrow of its own signal.
    pub fn with_cancellation_owned(mut self, signal: ShutdownSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(ShutdownSignal::is_shutting_down).unwrap_or(false)
    }

    pub(crate) fn cancellation(&self) -> Option<&ShutdownSignal> {
        self.cancel.as_ref()
    }

    pub(crate) fn log_dir(&self) -> std::path::PathBuf {
        self.repo_path.join(&self.config.artifacts.log_dir)
    }

    pub(crate) fn report_dir(&self) -> std::path::PathBuf {
        self.repo_path.join(&self.config.artifacts.report_dir)
    }
}

const COMMIT_BODY_CAP: usize = 8 * 1024;
const DIFF_BYTE_CAP: usize = 64 * 1024;
