//! In-memory `VcsAdapter` for controller/executor tests: a `Mutex`-guarded
//! fake store plus a call log, no real subprocess or filesystem
//! interaction.

use crate::adapter::VcsAdapter;
use crate::error::{VcsError, VcsResult};
use crate::trailer_parse::parse_message;
use crate::types::{Commit, MergeOutcome};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    branches: BTreeMap<String, Vec<Commit>>,
    calls: Vec<String>,
    next_rev: u64,
    next_squash_conflict: Option<Vec<String>>,
    current_branch: Option<String>,
}

pub struct MockVcsAdapter {
    state: Mutex<State>,
}

impl MockVcsAdapter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Seed a branch with an initial commit (as the materializer would).
    pub fn seed_branch(&self, name: &str, subject: &str, trailers: BTreeMap<String, String>) {
        let mut state = self.state.lock().unwrap();
        let rev = next_revision(&mut state);
        state
            .branches
            .entry(name.to_string())
            .or_default()
            .insert(
                0,
                Commit {
                    revision: rev,
                    subject: subject.to_string(),
                    body: String::new(),
                    trailers,
                },
            );
    }

    /// Make the next `squash` call report a conflict on the given files
    /// instead of merging cleanly.
    pub fn set_next_squash_conflict(&self, files: Vec<String>) {
        self.state.lock().unwrap().next_squash_conflict = Some(files);
    }
}

fn next_revision(state: &mut State) -> String {
    state.next_rev += 1;
    format!("mock-rev-{}", state.next_rev)
}

impl Default for MockVcsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VcsAdapter for MockVcsAdapter {
    async fn init_or_attach(&self, _path: &Path) -> VcsResult<()> {
        self.state.lock().unwrap().calls.push("init_or_attach".into());
        Ok(())
    }

    async fn log_subject_matches(
        &self,
        _path: &Path,
        branch: &str,
        subject_prefix: &str,
        limit: usize,
    ) -> VcsResult<Vec<Commit>> {
        let state = self.state.lock().unwrap();
        let commits = state.branches.get(branch).cloned().unwrap_or_default();
        Ok(commits
            .into_iter()
            .filter(|c| c.subject.starts_with(subject_prefix))
            .take(limit)
            .collect())
    }

    async fn branch_create(&self, _path: &Path, name: &str, _at_revision: &str) -> VcsResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("branch_create:{name}"));
        if state.branches.contains_key(name) {
            return Err(VcsError::BranchExists(name.to_string()));
        }
        state.branches.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn branch_list(&self, _path: &Path, glob: &str) -> VcsResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let prefix = glob.trim_end_matches('*');
        Ok(state
            .branches
            .keys()
            .filter(|b| b.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn branch_delete(&self, _path: &Path, name: &str) -> VcsResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state.branches.remove(name).is_some())
    }

    async fn new_change(
        &self,
        _path: &Path,
        _parent_revisions: &[String],
        message: &str,
    ) -> VcsResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("new_change:{message}"));
        let rev = next_revision(&mut state);
        let (subject, body, trailers) = parse_message(message);
        if let Some(branch) = state.current_branch.clone() {
            state.branches.entry(branch).or_default().insert(
                0,
                Commit {
                    revision: rev.clone(),
                    subject,
                    body,
                    trailers,
                },
            );
        }
        Ok(rev)
    }

    async fn describe(&self, _path: &Path, _revision: &str, message: &str) -> VcsResult<()> {
        let mut state = self.state.lock().unwrap();
        let (subject, body, trailers) = parse_message(message);
        let rev = next_revision(&mut state);
        if let Some((_, commits)) = state.branches.iter_mut().next() {
            commits.insert(
                0,
                Commit {
                    revision: rev,
                    subject,
                    body,
                    trailers,
                },
            );
        }
        Ok(())
    }

    async fn switch_to(&self, _path: &Path, revision_or_branch: &str) -> VcsResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("switch_to:{revision_or_branch}"));
        state.current_branch = Some(revision_or_branch.to_string());
        Ok(())
    }

    async fn diff(&self, _path: &Path, base: &str, head: &str, _byte_cap: usize) -> VcsResult<String> {
        Ok(format!("diff {base}..{head}"))
    }

    async fn squash(
        &self,
        _path: &Path,
        from_revision: &str,
        into_revision: &str,
    ) -> VcsResult<MergeOutcome> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("squash:{from_revision}->{into_revision}"));
        match state.next_squash_conflict.take() {
            Some(files) => Ok(MergeOutcome::Conflict { files }),
            None => Ok(MergeOutcome::Merged),
        }
    }

    async fn rebase(&self, _path: &Path, revision: &str, onto: &str) -> VcsResult<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("rebase:{revision}->{onto}"));
        Ok(())
    }

    async fn trailers_of(
        &self,
        _path: &Path,
        revision: &str,
    ) -> VcsResult<BTreeMap<String, String>> {
        let state = self.state.lock().unwrap();
        for commits in state.branches.values() {
            if let Some(c) = commits.iter().find(|c| c.revision == revision) {
                return Ok(c.trailers.clone());
            }
        }
        Ok(BTreeMap::new())
    }

    async fn stage_all(&self, _path: &Path) -> VcsResult<()> {
        Ok(())
    }

    async fn is_dirty(&self, _path: &Path) -> VcsResult<bool> {
        Ok(false)
    }
}

/// Append a commit directly onto a named branch -- a convenience used by
/// gardener tests that need finer control than `describe`'s
/// most-recently-touched-branch heuristic.
pub trait MockVcsAdapterExt {
    fn push_commit(&self, branch: &str, commit: Commit);
}

impl MockVcsAdapterExt for MockVcsAdapter {
    fn push_commit(&self, branch: &str, commit: Commit) {
        let mut state = self.state.lock().unwrap();
        state.branches.entry(branch.to_string()).or_default().insert(0, commit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn branch_create_is_idempotent_check() {
        let mock = MockVcsAdapter::new();
        mock.branch_create(Path::new("/x"), "b", "rev").await.unwrap();
        let err = mock.branch_create(Path::new("/x"), "b", "rev").await;
        assert!(matches!(err, Err(VcsError::BranchExists(_))));
    }

    #[tokio::test]
    async fn seeded_branch_is_readable() {
        let mock = MockVcsAdapter::new();
        let mut trailers = BTreeMap::new();
        trailers.insert("Arborist-Step".to_string(), "pending".to_string());
        mock.seed_branch("feature/demo/T001", "task(T001): seed", trailers);

        let commits = mock
            .log_subject_matches(Path::new("/x"), "feature/demo/T001", "task(T001):", 10)
            .await
            .unwrap();
        assert_eq!(commits.len(), 1);
    }
}
