pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod shutdown;
pub mod trailers;

pub use config::{ArboristConfig, ConfigError, ConfigOverlay};
pub use error::{CoreError, CoreResult};
pub use model::{TaskId, TaskNode, TaskState, TaskTree, TreeError};
pub use shutdown::ShutdownSignal;
pub use trailers::Trailers;
