//! `arborist build`: parse a spec directory into a task tree and
//! materialize it onto the target repository, per spec §4.5/§6.

use super::{save_tree_snapshot, spec_id_from_dir, tree_snapshot_path, TRUNK};
use crate::error::{ArboristError, ArboristResult};
use arborist_core::model::TaskTree;
use arborist_gardener::{GardenerError, MaterializeConflict};
use arborist_vcs::GitBackend;
use std::path::Path;

pub async fn run(
    target_repo: &Path,
    spec_dir: &Path,
    namespace: &str,
    ai: bool,
    force: bool,
) -> ArboristResult<()> {
    if ai {
        return Err(ArboristError::Config(
            "--ai (generating a spec tree from a natural-language prompt) is not implemented \
             by this kernel; write the spec directory by hand and drop the flag"
                .to_string(),
        ));
    }

    let spec_id = spec_id_from_dir(spec_dir)?;
    let tree = arborist_spec::parse_spec_dir(spec_dir, &spec_id, namespace)?;
    tree.validate()?;

    if !force {
        if let Some(reason) = structural_change(target_repo, &tree)? {
            return Err(GardenerError::from(MaterializeConflict::StructuralChange {
                id: spec_id.clone(),
                reason,
            })
            .into());
        }
    }

    let vcs = GitBackend::new();
    arborist_gardener::materialize(&tree, &vcs, target_repo, TRUNK).await?;
    save_tree_snapshot(target_repo, &tree)?;

    println!(
        "materialized {} task(s) under {}/{}",
        tree.nodes.len(),
        namespace,
        spec_id
    );
    Ok(())
}

/// Compare against the previously materialized tree, if any, and describe
/// the first structural change found: a task id that disappeared (renamed
/// or deleted) or a task reparented to a different ancestor. Dependency-only
/// changes are not structural -- they change scheduling, not branch
/// ancestry, so they are allowed without `--force`.
fn structural_change(target_repo: &Path, next: &TaskTree) -> ArboristResult<Option<String>> {
    let path = tree_snapshot_path(target_repo, &next.namespace, &next.spec_id);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    let prev: TaskTree = serde_json::from_str(&raw)?;

    let prev_ids: std::collections::BTreeSet<&String> = prev.nodes.keys().collect();
    let next_ids: std::collections::BTreeSet<&String> = next.nodes.keys().collect();
    let removed: Vec<&&String> = prev_ids.difference(&next_ids).collect();
    if !removed.is_empty() {
        return Ok(Some(format!(
            "task id(s) present in the previous build but missing now: {removed:?}"
        )));
    }

    for (id, prev_node) in &prev.nodes {
        if let Some(next_node) = next.nodes.get(id) {
            if prev_node.parent_id != next_node.parent_id {
                return Ok(Some(format!(
                    "task {id} reparented from {:?} to {:?}",
                    prev_node.parent_id, next_node.parent_id
                )));
            }
        }
    }

    Ok(None)
}
