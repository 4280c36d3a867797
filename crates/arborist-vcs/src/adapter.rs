use crate::error::VcsResult;
use crate::types::{Commit, MergeOutcome};
use async_trait::async_trait;
use std::path::Path;

/// Thin wrapper over the version-control CLI, per spec §4.1. Each operation
/// takes an explicit working-directory argument (no global CWD state per the
/// §9 redesign flag). Operations are process-local; concurrent invocation
/// within one working directory is not safe (Phase-1 single-worker premise).
#[async_trait]
pub trait VcsAdapter: Send + Sync {
    /// Ensure `path` is a repository with the required colocated VCS
    /// backing; idempotent.
    async fn init_or_attach(&self, path: &Path) -> VcsResult<()>;

    /// Commits on `branch` whose subject starts with `subject_prefix`,
    /// newest first, up to `limit`.
    async fn log_subject_matches(
        &self,
        path: &Path,
        branch: &str,
        subject_prefix: &str,
        limit: usize,
    ) -> VcsResult<Vec<Commit>>;

    /// Create a branch pointer at `at_revision`. Fails with
    /// [`crate::error::VcsError::BranchExists`] if present.
    async fn branch_create(&self, path: &Path, name: &str, at_revision: &str) -> VcsResult<()>;

    /// List branch names matching a shell-style glob.
    async fn branch_list(&self, path: &Path, glob: &str) -> VcsResult<Vec<String>>;

    /// Delete a branch pointer. Returns `true` if it existed.
    async fn branch_delete(&self, path: &Path, name: &str) -> VcsResult<bool>;

    /// Create a new change with one or more parent revisions and the given
    /// message, positioning the working copy on it. Returns the new
    /// revision id.
    async fn new_change(
        &self,
        path: &Path,
        parent_revisions: &[String],
        message: &str,
    ) -> VcsResult<String>;

    /// Set or overwrite the description of a mutable change (used to
    /// add/amend trailers on the most recently authored step).
    async fn describe(&self, path: &Path, revision: &str, message: &str) -> VcsResult<()>;

    /// Position the working copy on a revision or branch.
    async fn switch_to(&self, path: &Path, revision_or_branch: &str) -> VcsResult<()>;

    /// Unified diff between two revisions, truncated to a configured byte
    /// cap (head+tail retained with a truncation marker).
    async fn diff(&self, path: &Path, base: &str, head: &str, byte_cap: usize) -> VcsResult<String>;

    /// Fold the content of `from_revision` into `into_revision`. Conflicts
    /// are reported as [`MergeOutcome::Conflict`], not an error -- the
    /// caller (merge-up) decides what a conflict means for the task tree.
    async fn squash(
        &self,
        path: &Path,
        from_revision: &str,
        into_revision: &str,
    ) -> VcsResult<MergeOutcome>;

    /// Move `revision` onto a new base.
    async fn rebase(&self, path: &Path, revision: &str, onto: &str) -> VcsResult<()>;

    /// Extract trailer key/value pairs from a revision's commit message.
    async fn trailers_of(
        &self,
        path: &Path,
        revision: &str,
    ) -> VcsResult<std::collections::BTreeMap<String, String>>;

    /// Stage all working-copy changes (used before an implement commit).
    async fn stage_all(&self, path: &Path) -> VcsResult<()>;

    /// Whether the working copy has uncommitted changes.
    async fn is_dirty(&self, path: &Path) -> VcsResult<bool>;
}
