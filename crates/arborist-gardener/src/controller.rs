//! The single-worker control loop: find a ready leaf, drive its
//! implement/test/review cycle to completion or exhaustion, fold finished
//! work upward, repeat. Re-derives the candidate task and its state from
//! durable storage on every iteration rather than keeping a cached task
//! list, and drives exactly one task at a time -- no parallelism.

use crate::commit_message;
use crate::error::{GardenerError, GardenerResult, MaterializeConflict};
use crate::executors::{Executors, StepOutcome};
use crate::shutdown::ShutdownSignal;
use arborist_core::config::ArboristConfig;
use arborist_core::model::{TaskId, TaskNode, TaskState, TaskTree};
use arborist_core::paths::{report_path, CompletionReport, ReportResult};
use arborist_core::trailers::{task_subject_prefix, Outcome, Step, Trailers};
use arborist_protocol::StateReader;
use arborist_runner::RunnerAdapter;
use arborist_vcs::{MergeOutcome, VcsAdapter};
use std::collections::VecDeque;
use std::path::Path;

pub struct Controller<'a> {
    vcs: &'a dyn VcsAdapter,
    runner: &'a dyn RunnerAdapter,
    repo_path: &'a Path,
    config: &'a ArboristConfig,
    tree: &'a TaskTree,
    trunk: &'a str,
    cancel: ShutdownSignal,
}

impl<'a> Controller<'a> {
    pub fn new(
        vcs: &'a dyn VcsAdapter,
        runner: &'a dyn RunnerAdapter,
        repo_path: &'a Path,
        config: &'a ArboristConfig,
        tree: &'a TaskTree,
        trunk: &'a str,
    ) -> Self {
        Self {
            vcs,
            runner,
            repo_path,
            config,
            tree,
            trunk,
            cancel: ShutdownSignal::new(),
        }
    }

    /// A handle the caller installs a `ctrl_c` listener against (see
    /// `arborist-cli`'s `run` command).
    pub fn cancellation(&self) -> ShutdownSignal {
        self.cancel.clone()
    }

    fn executors(&self) -> Executors<'a> {
        Executors::new(self.vcs, self.runner, self.repo_path, self.config).with_cancellation_owned(self.cancel.clone())
    }

    fn branch_of(&self, node: &TaskNode) -> GardenerResult<String> {
        self.tree
            .branch_name(&node.id)
            .ok_or_else(|| GardenerError::Internal(format!("cannot compute branch name for {}", node.id)))
    }

    fn parent_branch_of(&self, node: &TaskNode) -> GardenerResult<String> {
        match &node.parent_id {
            Some(parent_id) => {
                let parent = self.tree.nodes.get(parent_id).ok_or_else(|| {
                    GardenerError::Internal(format!("missing parent node {parent_id}"))
                })?;
                self.branch_of(parent)
            }
            None => Ok(self.trunk.to_string()),
        }
    }

    /// The main loop. Exits `Ok(())` once the whole tree is `complete`;
    /// returns `Err` on stall, cancellation, or any unrecoverable error.
    pub async fn run(&self) -> GardenerResult<()> {
        loop {
            if self.cancel.is_shutting_down() {
                return Err(GardenerError::Internal(
                    "cancelled before the spec completed".to_string(),
                ));
            }

            let reader = StateReader::new(self.vcs, self.repo_path);
            let completed = reader.completed_ids(self.tree).await;

            if self.tree.nodes.keys().all(|id| completed.contains(id)) {
                self.finalize_spec().await?;
                return Ok(());
            }

            match self.find_candidate(&reader, &completed).await? {
                Some(candidate) => {
                    let leaf = self
                        .tree
                        .nodes
                        .get(&candidate)
                        .expect("candidate id comes from this tree");
                    let passed = self.drive(leaf).await?;
                    println!(
                        "task({}): {}",
                        leaf.id,
                        if passed { "complete" } else { "failed" }
                    );
                    self.merge_up(leaf).await?;
                }
                None => return Err(self.diagnose_stall(&reader).await),
            }
        }
    }

    /// First ready leaf (in stable tree order) not already `complete` or
    /// `failed`.
    async fn find_candidate(
        &self,
        reader: &StateReader<'_>,
        completed: &std::collections::HashSet<TaskId>,
    ) -> GardenerResult<Option<TaskId>> {
        for node in self.tree.ready_leaves(completed) {
            let branch = self.branch_of(node)?;
            let state = reader.state_of(&branch).await;
            if !matches!(state, TaskState::Complete | TaskState::Failed) {
                return Ok(Some(node.id.clone()));
            }
        }
        Ok(None)
    }

    /// Drive one leaf's implement/test/review cycle until it reaches
    /// `complete` or `failed`. Returns `true` for `complete`.
    async fn drive(&self, leaf: &TaskNode) -> GardenerResult<bool> {
        let branch = self.branch_of(leaf)?;
        let reader = StateReader::new(self.vcs, self.repo_path);
        let executors = self.executors();
        let mut attempts_this_cycle: u32 = 0;

        loop {
            if self.cancel.is_shutting_down() {
                return Err(GardenerError::Internal(format!(
                    "cancelled while driving task {}",
                    leaf.id
                )));
            }

            let (state, next) = reader.resolve(&branch).await;

            match state {
                TaskState::Complete => {
                    self.ensure_complete_commit(leaf, &branch, attempts_this_cycle)
                        .await?;
                    return Ok(true);
                }
                TaskState::Failed => return Ok(false),
                _ => {}
            }

            if attempts_this_cycle >= self.config.retry.max_retries {
                self.write_terminal_commit(leaf, &branch, false, attempts_this_cycle)
                    .await?;
                return Ok(false);
            }

            let step = next.unwrap_or(Step::Implement);

            let outcome = match step {
                Step::Implement => {
                    let lessons = reader.last_failure_bodies(&branch, 3).await;
                    executors
                        .implement(leaf, &branch, attempts_this_cycle, &lessons)
                        .await?
                }
                Step::Test => {
                    executors
                        .test(leaf, &branch, attempts_this_cycle, "unit")
                        .await?
                }
                Step::Review => {
                    let parent_branch = self.parent_branch_of(leaf)?;
                    executors
                        .review(leaf, &branch, &parent_branch, attempts_this_cycle)
                        .await?
                }
                Step::Complete => {
                    self.ensure_complete_commit(leaf, &branch, attempts_this_cycle)
                        .await?;
                    return Ok(true);
                }
            };

            match outcome {
                StepOutcome::Interrupted => {
                    return Err(GardenerError::Internal(format!(
                        "cancelled mid-{} for task {}",
                        step.as_str(),
                        leaf.id
                    )));
                }
                StepOutcome::Failure => attempts_this_cycle += 1,
                StepOutcome::Success => {}
            }
        }
    }

    /// Append the `complete` commit if it is not already the branch tip --
    /// the case where `review` just approved but the process has not yet
    /// recorded the terminal commit (or crashed between the two).
    async fn ensure_complete_commit(
        &self,
        leaf: &TaskNode,
        branch: &str,
        attempts: u32,
    ) -> GardenerResult<()> {
        let commits = self
            .vcs
            .log_subject_matches(self.repo_path, branch, &task_subject_prefix(&leaf.id), 1)
            .await?;
        if let Some(c) = commits.first() {
            if Trailers::from_map(&c.trailers).step == Some(Step::Complete) {
                return Ok(());
            }
        }
        self.write_terminal_commit(leaf, branch, true, attempts).await
    }

    async fn write_terminal_commit(
        &self,
        leaf: &TaskNode,
        branch: &str,
        passed: bool,
        retries: u32,
    ) -> GardenerResult<()> {
        let report_dir = self.repo_path.join(&self.config.artifacts.report_dir);
        tokio::fs::create_dir_all(&report_dir).await?;
        let timestamp = commit_message::filename_timestamp(chrono::Utc::now());
        let report_file = report_path(&report_dir, &leaf.id, &timestamp);
        let report = CompletionReport {
            task_id: leaf.id.clone(),
            result: if passed { ReportResult::Pass } else { ReportResult::Fail },
            retries,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| GardenerError::Internal(format!("failed to serialize report: {e}")))?;
        tokio::fs::write(&report_file, json).await?;

        let mut trailers = Trailers::default();
        trailers.step = Some(Step::Complete);
        trailers.result = Some(if passed { Outcome::Pass } else { Outcome::Fail });
        trailers.report = Some(report_file.to_string_lossy().into_owned());

        let subject = if passed {
            format!("task({}): complete \"{}\"", leaf.id, leaf.name)
        } else {
            format!(
                "task({}): failed \"{}\" after {} retries",
                leaf.id, leaf.name, retries
            )
        };
        let message = commit_message::build(&subject, "", &trailers);
        self.vcs.switch_to(self.repo_path, branch).await?;
        self.vcs.new_change(self.repo_path, &[], &message).await?;
        Ok(())
    }

    /// Fold a completed leaf's work into ancestors, one generation at a
    /// time, stopping at the first parent whose other descendants are not
    /// all complete yet.
    async fn merge_up(&self, leaf: &TaskNode) -> GardenerResult<()> {
        let mut current = leaf;
        loop {
            let parent_id = match &current.parent_id {
                Some(p) => p,
                None => return Ok(()),
            };
            let parent = self
                .tree
                .nodes
                .get(parent_id)
                .ok_or_else(|| GardenerError::Internal(format!("missing parent node {parent_id}")))?;

            let reader = StateReader::new(self.vcs, self.repo_path);
            if !self.all_descendants_complete(parent, &reader).await? {
                return Ok(());
            }

            let parent_branch = self.branch_of(parent)?;
            let (state, _) = reader.resolve(&parent_branch).await;
            if state == TaskState::Complete {
                current = parent;
                continue;
            }

            self.fold_children(parent, &parent_branch).await?;
            self.write_terminal_commit(parent, &parent_branch, true, 0).await?;

            current = parent;
        }
    }

    async fn all_descendants_complete(
        &self,
        node: &TaskNode,
        reader: &StateReader<'_>,
    ) -> GardenerResult<bool> {
        let mut queue: VecDeque<&TaskNode> = VecDeque::new();
        queue.push_back(node);
        while let Some(n) = queue.pop_front() {
            if n.is_leaf() {
                let branch = self.branch_of(n)?;
                if reader.state_of(&branch).await != TaskState::Complete {
                    return Ok(false);
                }
            } else {
                for child_id in &n.children_ids {
                    let child = self.tree.nodes.get(child_id).ok_or_else(|| {
                        GardenerError::Internal(format!("missing child node {child_id}"))
                    })?;
                    queue.push_back(child);
                }
            }
        }
        Ok(true)
    }

    /// Fold every child branch into `parent_branch` via squash, recording
    /// which child ids were folded in a synthetic rollup commit. On
    /// conflict, records a `rollup conflict` commit and returns a stall
    /// error per spec §4.9.
    async fn fold_children(&self, parent: &TaskNode, parent_branch: &str) -> GardenerResult<()> {
        self.vcs.switch_to(self.repo_path, parent_branch).await?;

        let mut folded = Vec::new();
        for child_id in &parent.children_ids {
            let child = self
                .tree
                .nodes
                .get(child_id)
                .ok_or_else(|| GardenerError::Internal(format!("missing child node {child_id}")))?;
            let child_branch = self.branch_of(child)?;

            match self
                .vcs
                .squash(self.repo_path, &child_branch, parent_branch)
                .await?
            {
                MergeOutcome::Merged => folded.push(child_id.clone()),
                MergeOutcome::Conflict { files } => {
                    self.write_rollup_conflict(parent, parent_branch, &files).await?;
                    return Err(MaterializeConflict::StructuralChange {
                        id: parent.id.clone(),
                        reason: format!("rollup conflict on {} file(s)", files.len()),
                    }
                    .into());
                }
            }
        }

        let subject = format!("task({}): rollup", parent.id);
        let body = format!("folded: {}", folded.join(", "));
        let mut trailers = Trailers::default();
        trailers.extra.insert("Arborist-Folded".to_string(), folded.join(","));
        let message = commit_message::build(&subject, &body, &trailers);
        self.vcs.new_change(self.repo_path, &[], &message).await?;
        Ok(())
    }

    async fn write_rollup_conflict(
        &self,
        parent: &TaskNode,
        parent_branch: &str,
        files: &[String],
    ) -> GardenerResult<()> {
        let mut trailers = Trailers::default();
        trailers.step = Some(Step::Complete);
        trailers.result = Some(Outcome::Fail);
        let subject = format!("task({}): rollup conflict", parent.id);
        let body = files.join("\n");
        let message = commit_message::build(&subject, &body, &trailers);
        self.vcs.switch_to(self.repo_path, parent_branch).await?;
        self.vcs.new_change(self.repo_path, &[], &message).await?;
        Ok(())
    }

    /// Fold the topmost completed roots into `trunk`, once the whole forest
    /// is `complete`.
    async fn finalize_spec(&self) -> GardenerResult<()> {
        for root_id in &self.tree.root_ids {
            let root = self
                .tree
                .nodes
                .get(root_id)
                .ok_or_else(|| GardenerError::Internal(format!("missing root node {root_id}")))?;
            let root_branch = self.branch_of(root)?;
            match self.vcs.squash(self.repo_path, &root_branch, self.trunk).await? {
                MergeOutcome::Merged => {}
                MergeOutcome::Conflict { files } => {
                    self.write_rollup_conflict(root, self.trunk, &files).await?;
                    return Err(GardenerError::Stall(format!(
                        "finalize: conflict folding root task {} into trunk",
                        root.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// No ready leaf exists, yet the spec is not complete: list every
    /// non-terminal leaf and why it is blocked.
    async fn diagnose_stall(&self, reader: &StateReader<'_>) -> GardenerError {
        let mut blocked = Vec::new();
        for node in self.tree.leaves() {
            let branch = match self.branch_of(node) {
                Ok(b) => b,
                Err(_) => continue,
            };
            let state = reader.state_of(&branch).await;
            match state {
                TaskState::Complete => continue,
                TaskState::Failed => blocked.push(format!("{}: failed (retry cap exhausted)", node.id)),
                _ => {
                    let unmet: Vec<&str> = {
                        let mut unmet = Vec::new();
                        for dep in &node.depends_on {
                            let dep_branch = match self.tree.branch_name(dep) {
                                Some(b) => b,
                                None => continue,
                            };
                            if reader.state_of(&dep_branch).await != TaskState::Complete {
                                unmet.push(dep.as_str());
                            }
                        }
                        unmet
                    };
                    if unmet.is_empty() {
                        blocked.push(format!("{}: {state} (in progress, not yet ready to retry)", node.id));
                    } else {
                        blocked.push(format!("{}: waiting on {}", node.id, unmet.join(", ")));
                    }
                }
            }
        }
        GardenerError::Stall(blocked.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arborist_core::model::TaskNode;
    use arborist_runner::MockRunnerAdapter;
    use arborist_vcs::mock::{MockVcsAdapter, MockVcsAdapterExt};
    use arborist_vcs::Commit;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn leaf(id: &str, parent: Option<&str>, deps: &[&str]) -> TaskNode {
        TaskNode {
            id: id.into(),
            name: id.into(),
            description: format!("do {id}"),
            parent_id: parent.map(|s| s.into()),
            children_ids: vec![],
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            parallelizable: false,
        }
    }

    fn single_task_tree() -> TaskTree {
        let mut tree = TaskTree::new("demo", "feature");
        tree.nodes.insert("T001".into(), leaf("T001", None, &[]));
        tree.root_ids = vec!["T001".into()];
        tree
    }

    #[tokio::test]
    async fn drives_a_single_task_to_completion_on_all_passes() {
        let vcs = MockVcsAdapter::new();
        // The same canned response feeds both `implement` (judged on exit
        // success alone) and `review` (judged on content) -- it must read
        // as an approval or the task would cycle back to `implement`
        // forever instead of reaching `complete`.
        let runner = MockRunnerAdapter::always_succeeding("APPROVED: looks good");
        let mut config = ArboristConfig::default();
        config.test_command = Some("true".to_string());
        let tree = single_task_tree();
        let path = PathBuf::from("/repo");

        let controller = Controller::new(&vcs, &runner, &path, &config, &tree, "main");
        let leaf = tree.nodes.get("T001").unwrap();
        let passed = controller.drive(leaf).await.unwrap();
        assert!(passed);

        let calls = vcs.calls();
        assert!(calls.iter().any(|c| c.contains("complete")));
    }

    #[tokio::test]
    async fn exhausting_retries_writes_a_failed_commit() {
        let vcs = MockVcsAdapter::new();
        let runner = MockRunnerAdapter::always_failing("nope");
        let mut config = ArboristConfig::default();
        config.retry.max_retries = 2;
        let tree = single_task_tree();
        let path = PathBuf::from("/repo");

        let controller = Controller::new(&vcs, &runner, &path, &config, &tree, "main");
        let leaf = tree.nodes.get("T001").unwrap();
        let passed = controller.drive(leaf).await.unwrap();
        assert!(!passed);

        let calls = vcs.calls();
        assert!(calls.iter().any(|c| c.contains("failed") && c.contains("retries")));
    }

    #[tokio::test]
    async fn merge_up_is_idempotent_on_an_already_complete_parent() {
        let vcs = MockVcsAdapter::new();
        let mut tree = TaskTree::new("demo", "feature");
        let mut phase = leaf("phase1", None, &[]);
        phase.children_ids = vec!["T001".into()];
        tree.nodes.insert("phase1".into(), phase);
        tree.nodes.insert("T001".into(), leaf("T001", Some("phase1"), &[]));
        tree.root_ids = vec!["phase1".into()];

        let mut trailers = BTreeMap::new();
        trailers.insert("Arborist-Step".to_string(), "complete".to_string());
        trailers.insert("Arborist-Result".to_string(), "pass".to_string());
        vcs.seed_branch("feature/demo/phase1/T001", "task(T001): complete \"x\"", trailers.clone());
        vcs.seed_branch("feature/demo/phase1", "task(phase1): complete \"x\"", trailers);

        let runner = MockRunnerAdapter::always_succeeding("");
        let config = ArboristConfig::default();
        let path = PathBuf::from("/repo");
        let controller = Controller::new(&vcs, &runner, &path, &config, &tree, "main");

        let t001 = tree.nodes.get("T001").unwrap();
        controller.merge_up(t001).await.unwrap();

        assert!(!vcs.calls().iter().any(|c| c.starts_with("squash")));
    }

    #[tokio::test]
    async fn merge_up_rolls_up_into_a_parent_once_its_only_child_completes() {
        let vcs = MockVcsAdapter::new();
        let mut tree = TaskTree::new("demo", "feature");
        let mut phase = leaf("phase1", None, &[]);
        phase.children_ids = vec!["T001".into()];
        tree.nodes.insert("phase1".into(), phase);
        tree.nodes.insert("T001".into(), leaf("T001", Some("phase1"), &[]));
        tree.root_ids = vec!["phase1".into()];

        let mut trailers = BTreeMap::new();
        trailers.insert("Arborist-Step".to_string(), "complete".to_string());
        trailers.insert("Arborist-Result".to_string(), "pass".to_string());
        vcs.seed_branch("feature/demo/phase1/T001", "task(T001): complete \"x\"", trailers);

        let runner = MockRunnerAdapter::always_succeeding("");
        let config = ArboristConfig::default();
        let path = PathBuf::from("/repo");
        let controller = Controller::new(&vcs, &runner, &path, &config, &tree, "main");

        let t001 = tree.nodes.get("T001").unwrap();
        controller.merge_up(t001).await.unwrap();

        let calls = vcs.calls();
        assert!(calls.iter().any(|c| c.starts_with("squash:")));
        assert!(calls
            .iter()
            .any(|c| c.contains("task(phase1): complete")));
    }

    #[tokio::test]
    async fn merge_up_on_conflict_writes_rollup_conflict_and_stalls() {
        let vcs = MockVcsAdapter::new();
        let mut tree = TaskTree::new("demo", "feature");
        let mut phase = leaf("phase1", None, &[]);
        phase.children_ids = vec!["T001".into()];
        tree.nodes.insert("phase1".into(), phase);
        tree.nodes.insert("T001".into(), leaf("T001", Some("phase1"), &[]));
        tree.root_ids = vec!["phase1".into()];

        let mut trailers = BTreeMap::new();
        trailers.insert("Arborist-Step".to_string(), "complete".to_string());
        trailers.insert("Arborist-Result".to_string(), "pass".to_string());
        vcs.seed_branch("feature/demo/phase1/T001", "task(T001): complete \"x\"", trailers);
        vcs.set_next_squash_conflict(vec!["src/lib.rs".to_string()]);

        let runner = MockRunnerAdapter::always_succeeding("");
        let config = ArboristConfig::default();
        let path = PathBuf::from("/repo");
        let controller = Controller::new(&vcs, &runner, &path, &config, &tree, "main");

        let t001 = tree.nodes.get("T001").unwrap();
        let result = controller.merge_up(t001).await;
        assert!(matches!(result, Err(GardenerError::Materialize(_))));
        assert!(vcs.calls().iter().any(|c| c.contains("rollup conflict")));
    }

    #[tokio::test]
    async fn diagnose_stall_reports_unmet_dependencies() {
        let vcs = MockVcsAdapter::new();
        let mut tree = TaskTree::new("demo", "feature");
        tree.nodes.insert("T001".into(), leaf("T001", None, &[]));
        tree.nodes.insert("T002".into(), leaf("T002", None, &["T001"]));
        tree.root_ids = vec!["T001".into(), "T002".into()];

        let mut trailers = BTreeMap::new();
        trailers.insert("Arborist-Step".to_string(), "complete".to_string());
        trailers.insert("Arborist-Result".to_string(), "fail".to_string());
        vcs.seed_branch("feature/demo/T001", "task(T001): failed \"x\" after 3 retries", trailers);

        let runner = MockRunnerAdapter::always_succeeding("");
        let config = ArboristConfig::default();
        let path = PathBuf::from("/repo");
        let controller = Controller::new(&vcs, &runner, &path, &config, &tree, "main");

        let reader = StateReader::new(&vcs, &path);
        let err = controller.diagnose_stall(&reader).await;
        match err {
            GardenerError::Stall(msg) => {
                assert!(msg.contains("T001: failed"));
                assert!(msg.contains("T002: waiting on T001"));
            }
            other => panic!("expected Stall, got {other:?}"),
        }
    }

    #[allow(dead_code)]
    fn use_commit_type(_c: Commit) {}
}
