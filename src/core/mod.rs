pub mod config;
pub mod constraints;
pub mod types;

pub use config::{EvaluatorSection, GeneratorSection, XoptConfig, XoptSection};
pub use constraints::Violation;
pub use types::*;
