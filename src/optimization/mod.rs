pub mod callback;
pub mod driver;
pub mod evaluator;
pub mod history;
pub mod traits;

pub use callback::{format_duration, BestValue, ProgressLog};
pub use driver::{OptimizationDriver, RunSummary};
pub use evaluator::{merge_outputs, EvaluationResult, Objective, ObjectiveEvaluator, StepCounter};
pub use history::{write_dump, Dump, EvaluationRecord};
pub use traits::{Generator, ProgressCallback};
