//! `arborist status`: re-derive every task's protocol state straight from
//! the repository, per spec §4.6/§6. No state is cached between calls --
//! only the task tree's shape is read from the build-time snapshot.

use super::all_tree_snapshots;
use crate::error::ArboristResult;
use crate::Format;
use arborist_protocol::StateReader;
use arborist_vcs::GitBackend;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct TaskStatus {
    id: String,
    state: String,
    last_step: Option<String>,
    retries: u32,
}

#[derive(Serialize)]
struct SpecStatus {
    namespace: String,
    spec_id: String,
    tasks: Vec<TaskStatus>,
}

pub async fn run(target_repo: &Path, spec_id: Option<String>, format: Format) -> ArboristResult<()> {
    let vcs = GitBackend::new();
    let reader = StateReader::new(&vcs, target_repo);

    let mut specs = Vec::new();
    for (namespace, id) in all_tree_snapshots(target_repo) {
        if let Some(want) = &spec_id {
            if &id != want {
                continue;
            }
        }
        let tree = match super::load_tree_snapshot(target_repo, &namespace, &id) {
            Ok(t) => t,
            Err(_) => continue,
        };

        let mut tasks = Vec::new();
        for (task_id, _) in &tree.nodes {
            let Some(branch) = tree.branch_name(task_id) else {
                continue;
            };
            let state = reader.state_of(&branch).await;
            let last_step = reader.last_step(&branch).await;
            let retries = reader.last_attempt(&branch).await;
            tasks.push(TaskStatus {
                id: task_id.clone(),
                state: state.to_string(),
                last_step: last_step.map(|s| s.as_str().to_string()),
                retries,
            });
        }
        specs.push(SpecStatus {
            namespace,
            spec_id: id,
            tasks,
        });
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&specs)?),
        Format::Text => {
            if specs.is_empty() {
                println!("no specs have been built against this repository yet");
            }
            for spec in &specs {
                println!("{}/{}", spec.namespace, spec.spec_id);
                for task in &spec.tasks {
                    println!(
                        "  {:<12} {:<12} last_step={:<10} retries={}",
                        task.id,
                        task.state,
                        task.last_step.as_deref().unwrap_or("-"),
                        task.retries
                    );
                }
            }
        }
    }

    Ok(())
}
