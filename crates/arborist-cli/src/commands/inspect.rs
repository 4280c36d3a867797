//! `arborist inspect <task-id>`: list every `task(<id>):` commit on that
//! task's branch with its full trailer set, per spec §6. Finds the branch by
//! glob rather than requiring the caller to know its namespace/spec-id/
//! ancestor prefix.

use crate::error::{ArboristError, ArboristResult};
use crate::Format;
use arborist_core::trailers::{task_subject_prefix, Trailers};
use arborist_vcs::GitBackend;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CommitView {
    revision: String,
    subject: String,
    body: String,
    trailers: Vec<String>,
}

pub async fn run(target_repo: &Path, task_id: &str, format: Format) -> ArboristResult<()> {
    let vcs = GitBackend::new();
    let matches = vcs.branch_list(target_repo, &format!("*/{task_id}")).await?;

    let Some(branch) = matches.first() else {
        return Err(ArboristError::Config(format!(
            "no branch found for task id {task_id}"
        )));
    };
    if matches.len() > 1 {
        tracing::warn!(
            "task id {task_id} matches {} branches; showing {branch}",
            matches.len()
        );
    }

    let prefix = task_subject_prefix(task_id);
    let commits = vcs
        .log_subject_matches(target_repo, branch, &prefix, usize::MAX)
        .await?;

    let views: Vec<CommitView> = commits
        .into_iter()
        .map(|c| CommitView {
            revision: c.revision,
            subject: c.subject,
            body: c.body,
            trailers: Trailers::from_map(&c.trailers).to_lines(),
        })
        .collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&views)?),
        Format::Text => {
            println!("{branch}");
            for view in &views {
                println!("{}  {}", &view.revision[..view.revision.len().min(12)], view.subject);
                for line in &view.trailers {
                    println!("    {line}");
                }
            }
        }
    }

    Ok(())
}
