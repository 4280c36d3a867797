pub mod state_machine;
pub mod state_reader;

pub use state_machine::{next_step, transition, StepResult};
pub use state_reader::StateReader;
