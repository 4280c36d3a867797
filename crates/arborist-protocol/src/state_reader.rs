//! Given a task's branch, read commit history and trailers to compute its
//! protocol state, per spec §4.6. The repository is re-read on every call;
//! no in-memory task state is authoritative (spec §2).

use crate::state_machine::{transition, StepResult};
use arborist_core::model::{TaskState, TaskTree};
use arborist_core::trailers::{task_subject_prefix, Outcome, Step, Trailers};
use arborist_vcs::{Commit, VcsAdapter};
use std::collections::HashSet;
use std::path::Path;

pub struct StateReader<'a> {
    vcs: &'a dyn VcsAdapter,
    repo_path: &'a Path,
}

impl<'a> StateReader<'a> {
    pub fn new(vcs: &'a dyn VcsAdapter, repo_path: &'a Path) -> Self {
        Self { vcs, repo_path }
    }

    /// Derive the task's id from its branch name -- the final `/`-separated
    /// segment, per the `branch_name` convention in §4.4.
    fn task_id_of(branch: &str) -> &str {
        branch.rsplit('/').next().unwrap_or(branch)
    }

    async fn matching_commits(&self, branch: &str, limit: usize) -> Vec<Commit> {
        let task_id = Self::task_id_of(branch);
        self.vcs
            .log_subject_matches(self.repo_path, branch, &task_subject_prefix(task_id), limit)
            .await
            .unwrap_or_default()
    }

    /// Algorithm per §4.6: query commits newest-first; a `complete` step
    /// trailer resolves to `complete`/`failed` by its `Result`; otherwise
    /// the latest `Arborist-Step` maps directly to the in-progress state;
    /// no matching commit at all means the branch only has its seed
    /// (`pending`).
    pub async fn state_of(&self, branch: &str) -> TaskState {
        let commits = self.matching_commits(branch, 1).await;
        let latest = match commits.first() {
            Some(c) => c,
            None => return TaskState::Pending,
        };
        let trailers = Trailers::from_map(&latest.trailers);
        match trailers.step {
            Some(Step::Complete) => match trailers.result {
                Some(Outcome::Pass) => TaskState::Complete,
                Some(Outcome::Fail) => TaskState::Failed,
                None => TaskState::Pending,
            },
            Some(Step::Implement) => TaskState::Implementing,
            Some(Step::Test) => TaskState::Testing,
            Some(Step::Review) => TaskState::Reviewing,
            None => TaskState::Pending,
        }
    }

    /// Pair `state_of` with the protocol state machine's transition table to
    /// tell the controller what to run next, per §4.7: `state_of` alone
    /// conflates pass and fail within a step (`implement`/`test`/`review`
    /// all map to their in-progress state regardless of outcome, per the
    /// literal §4.6 wording), which is enough for display but not for
    /// driving -- `resolve` re-derives the logical post-step state by
    /// feeding the latest commit's actual outcome through `transition`.
    pub async fn resolve(&self, branch: &str) -> (TaskState, Option<Step>) {
        let commits = self.matching_commits(branch, 1).await;
        let latest = match commits.first() {
            Some(c) => c,
            None => return (TaskState::Pending, Some(Step::Implement)),
        };
        let trailers = Trailers::from_map(&latest.trailers);
        match trailers.step {
            Some(Step::Complete) => match trailers.result {
                Some(Outcome::Pass) => (TaskState::Complete, None),
                Some(Outcome::Fail) => (TaskState::Failed, None),
                None => (TaskState::Pending, Some(Step::Implement)),
            },
            Some(Step::Implement) => transition(
                TaskState::Implementing,
                StepResult {
                    step: Step::Implement,
                    success: trailers.result == Some(Outcome::Pass),
                },
            ),
            Some(Step::Test) => transition(
                TaskState::Testing,
                StepResult {
                    step: Step::Test,
                    success: trailers.test == Some(Outcome::Pass),
                },
            ),
            Some(Step::Review) => transition(
                TaskState::Reviewing,
                StepResult {
                    step: Step::Review,
                    success: trailers.review
                        == Some(arborist_core::trailers::ReviewVerdict::Approved),
                },
            ),
            None => (TaskState::Pending, Some(Step::Implement)),
        }
    }

    /// The review verdict of the latest commit, when that commit is itself
    /// a review step. `state_of` collapses both verdicts to `reviewing`
    /// per §4.6 step 3; the controller needs the verdict itself to decide
    /// whether a reviewing task is awaiting its complete commit or is
    /// about to re-enter `implement` after a rejection.
    pub async fn latest_review_verdict(
        &self,
        branch: &str,
    ) -> Option<arborist_core::trailers::ReviewVerdict> {
        let commits = self.matching_commits(branch, 1).await;
        let latest = commits.first()?;
        let trailers = Trailers::from_map(&latest.trailers);
        match trailers.step {
            Some(Step::Review) => trailers.review,
            _ => None,
        }
    }

    /// The `Arborist-Step` trailer of the branch's most recent matching
    /// commit, for display purposes (`status`/`inspect`) -- `None` means the
    /// branch only carries its seed commit.
    pub async fn last_step(&self, branch: &str) -> Option<Step> {
        let commits = self.matching_commits(branch, 1).await;
        let latest = commits.first()?;
        Trailers::from_map(&latest.trailers).step
    }

    /// Maximum `Arborist-Retry` seen across commits on this branch.
    /// `Arborist-Retry` is monotonically non-resetting per the resolved
    /// Open Question in §9, so the maximum observed value is the current
    /// attempt index.
    pub async fn last_attempt(&self, branch: &str) -> u32 {
        self.matching_commits(branch, usize::MAX)
            .await
            .iter()
            .filter_map(|c| Trailers::from_map(&c.trailers).retry)
            .max()
            .unwrap_or(0)
    }

    /// Subjects+bodies of recent failed implement/test/review commits,
    /// newest first, to feed back into the next implement prompt as
    /// "lessons learned".
    pub async fn last_failure_bodies(&self, branch: &str, limit: usize) -> Vec<String> {
        self.matching_commits(branch, usize::MAX)
            .await
            .into_iter()
            .filter(|c| {
                let t = Trailers::from_map(&c.trailers);
                matches!(t.result, Some(Outcome::Fail))
                    || matches!(t.test, Some(Outcome::Fail))
                    || matches!(
                        t.review,
                        Some(arborist_core::trailers::ReviewVerdict::Rejected)
                    )
            })
            .take(limit)
            .map(|c| format!("{}\n\n{}", c.subject, c.body))
            .collect()
    }

    /// Whether every `depends_on` entry of `tree`'s node for this branch is
    /// `complete`, combining dependency completion across the whole tree.
    pub async fn is_ready(&self, branch: &str, tree: &TaskTree) -> bool {
        let task_id = Self::task_id_of(branch).to_string();
        let node = match tree.nodes.get(&task_id) {
            Some(n) => n,
            None => return false,
        };
        for dep in &node.depends_on {
            let dep_branch = match tree.branch_name(dep) {
                Some(b) => b,
                None => return false,
            };
            if self.state_of(&dep_branch).await != TaskState::Complete {
                return false;
            }
        }
        true
    }

    /// Convenience used by the controller: the set of completed task ids
    /// across the whole tree, re-derived fresh each call.
    pub async fn completed_ids(&self, tree: &TaskTree) -> HashSet<String> {
        let mut completed = HashSet::new();
        for id in tree.nodes.keys() {
            if let Some(branch) = tree.branch_name(id) {
                if self.state_of(&branch).await == TaskState::Complete {
                    completed.insert(id.clone());
                }
            }
        }
        completed
    }
}
