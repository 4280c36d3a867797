//! The gardener: branch materialization, implement/test/review step
//! executors, and the single-worker control loop that drives tasks through
//! their lifecycle and folds completed subtrees upward. See spec §4.5–§4.9.

pub mod commit_message;
pub mod controller;
pub mod error;
pub mod executors;
pub mod materializer;
pub mod shutdown;

pub use controller::Controller;
pub use error::{GardenerError, GardenerResult, MaterializeConflict};
pub use executors::{Executors, StepOutcome};
pub use materializer::materialize;
pub use shutdown::ShutdownSignal;
