pub mod adapter;
pub mod error;
pub mod mock;
pub mod templates;

pub use adapter::{
    cap_head_tail, wait_with_cancellation, ProcessRunner, RunnerAdapter, RunnerResult,
    CANCEL_GRACE, DEFAULT_CAPTURE_CAP,
};
pub use error::RunnerError;
pub use mock::MockRunnerAdapter;
pub use templates::{CommandTemplate, PromptDelivery, RunnerRegistry};
