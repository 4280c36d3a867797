//! Project a `TaskTree` onto the repository, per spec §4.5: one branch
//! pointer per node seeded from the parent's branch (or trunk for a root),
//! plus an idempotent initial `pending` commit.

use crate::commit_message;
use crate::error::{GardenerError, GardenerResult, MaterializeConflict};
use arborist_core::model::TaskTree;
use arborist_core::trailers::{task_subject_prefix, Trailers};
use arborist_vcs::{VcsAdapter, VcsError};
use std::collections::VecDeque;
use std::path::Path;

pub async fn materialize(
    tree: &TaskTree,
    vcs: &dyn VcsAdapter,
    repo_path: &Path,
    trunk: &str,
) -> GardenerResult<()> {
    vcs.init_or_attach(repo_path).await?;

    let mut queue: VecDeque<&str> = tree.root_ids.iter().map(|s| s.as_str()).collect();

    while let Some(id) = queue.pop_front() {
        let node = tree
            .nodes
            .get(id)
            .ok_or_else(|| GardenerError::Internal(format!("dangling id in queue: {id}")))?;

        let branch = tree
            .branch_name(&id.to_string())
            .ok_or_else(|| GardenerError::Internal(format!("cannot compute branch name for {id}")))?;

        let parent_branch = match &node.parent_id {
            Some(parent_id) => tree
                .branch_name(parent_id)
                .ok_or_else(|| GardenerError::Internal(format!("missing parent branch for {id}")))?,
            None => trunk.to_string(),
        };

        ensure_branch(vcs, repo_path, id, &branch, &parent_branch).await?;
        ensure_pending_commit(vcs, repo_path, id, &branch).await?;

        for child in &node.children_ids {
            queue.push_back(child.as_str());
        }
    }

    Ok(())
}

async fn ensure_branch(
    vcs: &dyn VcsAdapter,
    repo_path: &Path,
    id: &str,
    branch: &str,
    parent_branch: &str,
) -> GardenerResult<()> {
    match vcs.branch_create(repo_path, branch, parent_branch).await {
        Ok(()) => Ok(()),
        Err(VcsError::BranchExists(_)) => {
            // Idempotent re-run: the branch already exists. Treat as fine
            // only if it already carries this task's seed commit;
            // otherwise the spec changed structurally underneath us.
            let existing = vcs
                .log_subject_matches(repo_path, branch, &task_subject_prefix(id), 1)
                .await?;
            if existing.is_empty() {
                return Err(MaterializeConflict::Diverged {
                    id: id.to_string(),
                    branch: branch.to_string(),
                }
                .into());
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn ensure_pending_commit(
    vcs: &dyn VcsAdapter,
    repo_path: &Path,
    id: &str,
    branch: &str,
) -> GardenerResult<()> {
    let existing = vcs
        .log_subject_matches(repo_path, branch, &task_subject_prefix(id), 1)
        .await?;
    if !existing.is_empty() {
        return Ok(()); // already materialized; no-op per idempotence requirement.
    }

    vcs.switch_to(repo_path, branch).await?;

    // `pending` is a derived `TaskState`, not one of the `Step` trailer
    // values (`{implement, test, review, complete}`); the seed commit
    // carries no `Arborist-Step` trailer at all, and its *absence* is what
    // the State Reader interprets as `pending` per §4.6 step 4.
    let trailers = Trailers::default();
    let message = commit_message::build(
        &format!("task({id}): pending"),
        "materialized by build",
        &trailers,
    );
    vcs.new_change(repo_path, &[], &message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arborist_core::model::TaskNode;
    use arborist_vcs::mock::MockVcsAdapter;
    use std::path::PathBuf;

    fn linear_tree() -> TaskTree {
        let mut tree = TaskTree::new("demo", "feature");
        tree.nodes.insert(
            "T001".into(),
            TaskNode {
                id: "T001".into(),
                name: "T001".into(),
                description: String::new(),
                parent_id: None,
                children_ids: vec![],
                depends_on: vec![],
                parallelizable: false,
            },
        );
        tree.root_ids = vec!["T001".into()];
        tree
    }

    #[tokio::test]
    async fn materializes_branch_and_seed_commit() {
        let mock = MockVcsAdapter::new();
        let tree = linear_tree();
        let path = PathBuf::from("/repo");

        materialize(&tree, &mock, &path, "main").await.unwrap();

        let calls = mock.calls();
        assert!(calls.iter().any(|c| c.starts_with("branch_create:feature/demo/T001")));
    }

    #[tokio::test]
    async fn second_materialize_is_idempotent() {
        let mock = MockVcsAdapter::new();
        let tree = linear_tree();
        let path = PathBuf::from("/repo");

        materialize(&tree, &mock, &path, "main").await.unwrap();
        let calls_after_first = mock.calls().len();
        materialize(&tree, &mock, &path, "main").await.unwrap();
        let calls_after_second = mock.calls().len();

        // The second run should not add a new_change call (no new commit).
        let new_changes_first = mock
            .calls()
            .iter()
            .take(calls_after_first)
            .filter(|c| c.starts_with("new_change"))
            .count();
        let new_changes_total = mock
            .calls()
            .iter()
            .take(calls_after_second)
            .filter(|c| c.starts_with("new_change"))
            .count();
        assert_eq!(new_changes_first, new_changes_total);
    }
}
