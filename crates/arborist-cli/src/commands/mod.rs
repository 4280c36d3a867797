pub mod build;
pub mod inspect;
pub mod run;
pub mod status;

use crate::error::{ArboristError, ArboristResult};
use arborist_core::model::TaskTree;
use std::path::{Path, PathBuf};

/// The default branch the root tasks of a spec are seeded from and
/// ultimately rolled up into. Not exposed as a flag in spec §6; every
/// example spec and test fixture in this kernel assumes a single trunk
/// named `main`.
pub const TRUNK: &str = "main";

/// Derive a stable spec id from a spec directory's name: lowercase,
/// non-alphanumeric runs collapsed to a single `-`.
pub fn spec_id_from_dir(spec_dir: &Path) -> ArboristResult<String> {
    let name = spec_dir
        .file_name()
        .ok_or_else(|| ArboristError::Config(format!("spec directory has no name: {}", spec_dir.display())))?
        .to_string_lossy();
    let mut id = String::new();
    let mut last_was_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            id.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !id.is_empty() {
            id.push('-');
            last_was_dash = true;
        }
    }
    while id.ends_with('-') {
        id.pop();
    }
    if id.is_empty() {
        return Err(ArboristError::Config(format!(
            "spec directory name yields an empty id: {}",
            spec_dir.display()
        )));
    }
    Ok(id)
}

/// Where `build` remembers the task tree it materialized, so `run`,
/// `status`, and `inspect` can re-derive the graph shape without re-parsing
/// the spec directory (which may not even exist relative to the target
/// repository any more). This is the spec snapshot that produced the
/// branches already in the repository, not a cache of derived state --
/// per-task state is still re-read from commit trailers on every call.
pub fn tree_snapshot_path(target_repo: &Path, namespace: &str, spec_id: &str) -> PathBuf {
    target_repo
        .join(".arborist")
        .join("trees")
        .join(format!("{namespace}__{spec_id}.json"))
}

pub fn save_tree_snapshot(target_repo: &Path, tree: &TaskTree) -> ArboristResult<()> {
    let path = tree_snapshot_path(target_repo, &tree.namespace, &tree.spec_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(tree)?)?;
    Ok(())
}

pub fn load_tree_snapshot(target_repo: &Path, namespace: &str, spec_id: &str) -> ArboristResult<TaskTree> {
    let path = tree_snapshot_path(target_repo, namespace, spec_id);
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArboristError::Config(format!(
                "no task tree recorded for {namespace}/{spec_id}; run `arborist build` first"
            ))
        } else {
            ArboristError::Io(source)
        }
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// All `(namespace, spec_id)` pairs `build` has ever materialized against
/// this repository, newest-modified first.
pub fn all_tree_snapshots(target_repo: &Path) -> Vec<(String, String)> {
    let dir = target_repo.join(".arborist").join("trees");
    let mut entries: Vec<(std::time::SystemTime, String, String)> = Vec::new();
    let Ok(read_dir) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((namespace, spec_id)) = stem.split_once("__") else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        entries.push((modified, namespace.to_string(), spec_id.to_string()));
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    entries.into_iter().map(|(_, ns, id)| (ns, id)).collect()
}
