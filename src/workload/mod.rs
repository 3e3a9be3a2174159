/// Workload execution against a Bao-enabled PostgreSQL.
///
/// ```text
/// workload file
///       ↓
/// statement.rs   classify / canonicalize
///       ↓
/// training.rs    participation (all, sampled fraction, manifest)
///       ↓
/// scheduler.rs   Execute / Retrain action sequence
///       ↓
/// runner.rs      executor.rs + bao.rs per statement, trainer per retrain
///       ↓
/// plan records
/// ```
pub mod bao;
pub mod executor;
pub mod runner;
pub mod scheduler;
pub mod statement;
pub mod training;

#[cfg(test)]
pub(crate) mod testing;

pub use bao::{BaoController, OptimizerMode};
pub use executor::QueryExecutor;
pub use runner::{WorkloadRun, WorkloadRunner};
pub use scheduler::{schedule, Action, ChunkSize};
pub use statement::{canonicalize, classify, parse_statements, read_statements, Statement, StatementKind};
pub use training::{TrainingAnnotation, TrainingManifest, TrainingSelection};
