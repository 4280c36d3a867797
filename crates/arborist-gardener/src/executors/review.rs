use super::{Executors, StepOutcome, COMMIT_BODY_CAP, DIFF_BYTE_CAP};
use crate::commit_message::{self, filename_timestamp};
use crate::error::GardenerResult;
use arborist_core::model::TaskNode;
use arborist_core::paths::review_log_path;
use arborist_core::trailers::{ReviewVerdict, Step, Trailers};
use arborist_runner::cap_head_tail;

impl<'a> Executors<'a> {
    /// Procedure per spec §4.8.3. The pessimistic default on ambiguous
    /// output (empty, whitespace-only, neither keyword) is `rejected`.
    pub async fn review(
        &self,
        task: &TaskNode,
        branch: &str,
        parent_branch: &str,
        retry_index: u32,
    ) -> GardenerResult<StepOutcome> {
        let diff = self
            .vcs
            .diff(self.repo_path, parent_branch, branch, DIFF_BYTE_CAP)
            .await?;

        let prompt = format!(
            "Task {}: {}\n\nReview the following diff and reply with a single line \
             beginning with APPROVED or REJECTED followed by your rationale.\n\n{diff}",
            task.id, task.name
        );

        let result = self
            .runner
            .run(
                &prompt,
                self.repo_path,
                self.config.timeouts.review,
                &self.config.runner.command_prefix,
                &[],
                self.cancellation(),
            )
            .await;

        if result.cancelled || self.is_cancelled() {
            return Ok(StepOutcome::Interrupted);
        }

        let timestamp = filename_timestamp(chrono::Utc::now());
        let log_dir = self.log_dir();
        tokio::fs::create_dir_all(&log_dir).await?;
        let log_path = review_log_path(&log_dir, &task.id, &timestamp);
        tokio::fs::write(&log_path, &result.output).await?;

        let verdict = parse_verdict(&result.output);
        let success = verdict == ReviewVerdict::Approved;

        let mut trailers = Trailers::default();
        trailers.step = Some(Step::Review);
        trailers.review = Some(verdict);
        trailers.retry = Some(retry_index);
        trailers.review_log = Some(log_path.to_string_lossy().into_owned());

        let verdict_word = match verdict {
            ReviewVerdict::Approved => "approved",
            ReviewVerdict::Rejected => "rejected",
        };
        let subject = format!(
            "task({}): review {} for \"{}\"",
            task.id, verdict_word, task.name
        );
        let body = cap_head_tail(&result.output, COMMIT_BODY_CAP);
        let message = commit_message::build(&subject, &body, &trailers);
        self.vcs.new_change(self.repo_path, &[], &message).await?;

        Ok(if success {
            StepOutcome::Success
        } else {
            StepOutcome::Failure
        })
    }
}

/// Parse the first non-empty line of runner output. `APPROVED`
/// (case-insensitive) -> approved; anything else, including empty or
/// whitespace-only output, -> rejected.
fn parse_verdict(output: &str) -> ReviewVerdict {
    match output.lines().find(|l| !l.trim().is_empty()) {
        Some(line) if line.trim_start().to_uppercase().starts_with("APPROVED") => {
            ReviewVerdict::Approved
        }
        _ => ReviewVerdict::Rejected,
    }
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
            description: String::new(),
            parent_id: None,
            children_ids: vec![],
            depends_on: vec![],
            parallelizable: false,
        }
    }

    #[test]
    fn approved_is_case_insensitive() {
        assert_eq!(parse_verdict("approved: looks good"), ReviewVerdict::Approved);
        assert_eq!(parse_verdict("APPROVED"), ReviewVerdict::Approved);
    }

    #[test]
    fn empty_or_ambiguous_output_is_rejected() {
        assert_eq!(parse_verdict(""), ReviewVerdict::Rejected);
        assert_eq!(parse_verdict("   \n\n  "), ReviewVerdict::Rejected);
        assert_eq!(parse_verdict("looks fine to me"), ReviewVerdict::Rejected);
    }

    #[tokio::test]
    async fn approved_runner_output_yields_success_outcome() {
        let vcs = MockVcsAdapter::new();
        let runner = MockRunnerAdapter::always_succeeding("APPROVED: ship it");
        let config = ArboristConfig::default();
        let path = std::env::temp_dir();
        let executors = Executors::new(&vcs, &runner, &path, &config);

        let outcome = executors
            .review(&node(), "feature/demo/T001", "main", 0)
            .await
            .unwrap();
        assert_eq!(outcome, StepOutcome::Success);
    }
}
