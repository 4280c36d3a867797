pub mod error;
pub mod parser;

pub use error::{SpecError, SpecResult};
pub use parser::parse_spec_dir;
