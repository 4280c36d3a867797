//! Pure protocol state machine: a function with no I/O,
//! `transition(current_state, step_result) -> (new_state, next_step_or_none)`,
//! an exhaustive match over `(State, Event)`. A free function rather than a
//! struct with internal history -- nothing here needs instance state, and
//! the one party that wants a transition log (the controller) gets it for
//! free from the commit history itself.

use arborist_core::model::TaskState;
use arborist_core::trailers::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    pub step: Step,
    pub success: bool,
}

/// The retry cap is not known to the machine; the controller imposes it and
/// transitions to `Failed` itself after exhausting attempts.
pub fn transition(current: TaskState, result: StepResult) -> (TaskState, Option<Step>) {
    use Step::*;
    use TaskState::*;

    match (current, result.step, result.success) {
        (Implementing, Implement, true) => (Testing, Some(Test)),
        (Implementing, Implement, false) => (Pending, Some(Implement)),
        (Testing, Test, true) => (Reviewing, Some(Review)),
        (Testing, Test, false) => (Pending, Some(Implement)),
        (Reviewing, Review, true) => (Complete, None),
        (Reviewing, Review, false) => (Pending, Some(Implement)),
        // Any unexpected sequence observed from the log is legal -- the
        // machine reads only the latest trailer and advances accordingly.
        (Complete, _, _) => (Complete, None),
        (Failed, _, _) => (Failed, None),
        (state, _, _) => (state, Some(Implement)),
    }
}

/// The step to run next for a state with no preceding step result, e.g. a
/// freshly materialized `pending` task.
pub fn next_step(state: TaskState) -> Option<Step> {
    match state {
        TaskState::Pending => Some(Step::Implement),
        TaskState::Implementing => Some(Step::Implement),
        TaskState::Testing => Some(Step::Test),
        TaskState::Reviewing => Some(Step::Review),
        TaskState::Complete | TaskState::Failed => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implement_pass_advances_to_testing() {
        let (state, step) = transition(
            TaskState::Implementing,
            StepResult {
                step: Step::Implement,
                success: true,
            },
        );
        assert_eq!(state, TaskState::Testing);
        assert_eq!(step, Some(Step::Test));
    }

    #[test]
    fn implement_fail_returns_to_pending() {
        let (state, step) = transition(
            TaskState::Implementing,
            StepResult {
                step: Step::Implement,
                success: false,
            },
        );
        assert_eq!(state, TaskState::Pending);
        assert_eq!(step, Some(Step::Implement));
    }

    #[test]
    fn review_approved_completes() {
        let (state, step) = transition(
            TaskState::Reviewing,
            StepResult {
                step: Step::Review,
                success: true,
            },
        );
        assert_eq!(state, TaskState::Complete);
        assert_eq!(step, None);
    }

    #[test]
    fn review_rejected_returns_to_pending() {
        let (state, step) = transition(
            TaskState::Reviewing,
            StepResult {
                step: Step::Review,
                success: false,
            },
        );
        assert_eq!(state, TaskState::Pending);
        assert_eq!(step, Some(Step::Implement));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let (state, step) = transition(
            TaskState::Complete,
            StepResult {
                step: Step::Implement,
                success: true,
            },
        );
        assert_eq!(state, TaskState::Complete);
        assert_eq!(step, None);

        let (state, step) = transition(
            TaskState::Failed,
            StepResult {
                step: Step::Review,
                success: false,
            },
        );
        assert_eq!(state, TaskState::Failed);
        assert_eq!(step, None);
    }

    #[test]
    fn is_deterministic() {
        let input = (
            TaskState::Testing,
            StepResult {
                step: Step::Test,
                success: true,
            },
        );
        assert_eq!(transition(input.0, input.1), transition(input.0, input.1));
    }
}
