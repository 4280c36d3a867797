use super::{Executors, StepOutcome, COMMIT_BODY_CAP};
use crate::commit_message;
use crate::error::GardenerResult;
use arborist_core::model::TaskNode;
use arborist_core::trailers::{Outcome, Step, Trailers};
use arborist_runner::cap_head_tail;

impl<'a> Executors<'a> {
    /// Procedure per spec §4.8.1.
    pub async fn implement(
        &self,
        task: &TaskNode,
        branch: &str,
        retry_index: u32,
        lessons: &[String],
    ) -> GardenerResult<StepOutcome> {
        self.vcs.switch_to(self.repo_path, branch).await?;

        let prompt = build_prompt(task, lessons);
        let result = self
            .runner
            .run(
                &prompt,
                self.repo_path,
                self.config.timeouts.implement,
                &self.config.runner.command_prefix,
                &[],
                self.cancellation(),
            )
            .await;

        if result.cancelled || self.is_cancelled() {
            return Ok(StepOutcome::Interrupted);
        }

        let body = cap_head_tail(&result.output, COMMIT_BODY_CAP);
        let mut trailers = Trailers::default();
        trailers.step = Some(Step::Implement);
        trailers.retry = Some(retry_index);

        let subject = if result.success {
            trailers.result = Some(Outcome::Pass);
            self.vcs.stage_all(self.repo_path).await?;
            format!("task({}): implement \"{}\"", task.id, task.name)
        } else {
            trailers.result = Some(Outcome::Fail);
            format!(
                "task({}): implement \"{}\" (failed, attempt {}/{})",
                task.id, task.name, retry_index, self.config.retry.max_retries
            )
        };

        let message = commit_message::build(&subject, &body, &trailers);
        self.vcs
            .new_change(self.repo_path, &[], &message)
            .await?;

        Ok(if result.success {
            StepOutcome::Success
        } else {
            StepOutcome::Failure
        })
    }
}

fn build_prompt(task: &TaskNode, lessons: &[String]) -> String {
    let mut prompt = format!(
        "Task {}: {}\n\n{}\n\nMake the code changes in place to complete this task.",
        task.id, task.name, task.description
    );
    if !lessons.is_empty() {
        prompt.push_str("\n\nLessons from previous attempts this cycle:\n");
        for lesson in lessons {
            prompt.push_str("---\n");
            prompt.push_str(lesson);
            prompt.push('\n');
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use arborist_core::config::ArboristConfig;
    use arborist_runner::MockRunnerAdapter;
    use arborist_vcs::MockVcsAdapter;
    use std::path::PathBuf;

    fn node() -> TaskNode {
        TaskNode {
            id: "T001".into(),
            name: "do the thing".into(),
            description: "implement the thing".into(),
            parent_id: None,
            children_ids: vec![],
            depends_on: vec![],
            parallelizable: false,
        }
    }

    #[tokio::test]
    async fn success_commit_carries_pass_trailer() {
        let vcs = MockVcsAdapter::new();
        let runner = MockRunnerAdapter::always_succeeding("did the thing");
        let config = ArboristConfig::default();
        let path = PathBuf::from("/repo");
        let executors = Executors::new(&vcs, &runner, &path, &config);

        let outcome = executors
            .implement(&node(), "feature/demo/T001", 0, &[])
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Success);
        assert!(vcs.calls().iter().any(|c| c.starts_with("new_change")));
    }

    #[test]
    fn prompt_includes_lessons_when_present() {
        let prompt = build_prompt(&node(), &["review rejected: missing tests".to_string()]);
        assert!(prompt.contains("Lessons from previous attempts"));
        assert!(prompt.contains("missing tests"));
    }
}
