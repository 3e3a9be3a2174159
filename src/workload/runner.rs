use super::executor::QueryExecutor;
use super::scheduler::Action;
use crate::db::Session;
use crate::error::WorkloadError;
use crate::explain::{format_duration_ms, PlanRecord};
use crate::trainer::ModelTrainer;

/// Everything a run produced. `failure` is set when an action failed; the
/// results gathered before it are kept.
#[derive(Debug)]
pub struct WorkloadRun {
    pub results: Vec<PlanRecord>,
    pub failure: Option<WorkloadError>,
}

impl WorkloadRun {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct WorkloadRunner<S, T> {
    executor: QueryExecutor<S>,
    trainer: T,
    quiet: bool,
}

impl<S: Session, T: ModelTrainer> WorkloadRunner<S, T> {
    pub fn new(executor: QueryExecutor<S>, trainer: T, quiet: bool) -> Self {
        Self {
            executor,
            trainer,
            quiet,
        }
    }

    pub fn executor(&self) -> &QueryExecutor<S> {
        &self.executor
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    /// Realize `actions` strictly in order. A retrain completes before the
    /// next statement starts; the first failing action ends the run.
    pub async fn run(&mut self, actions: Vec<Action>) -> WorkloadRun {
        let mut results = Vec::new();

        for action in actions {
            let outcome = match action {
                Action::Execute(annotation) => {
                    let statement = &annotation.statement;
                    if !self.quiet {
                        tracing::info!("Now running query {}", statement.text());
                        if statement.is_workload() && annotation.participates {
                            tracing::info!("Using query {} for training", statement.text());
                        }
                    }
                    self.executor
                        .execute(statement, annotation.participates)
                        .await
                }
                Action::Retrain => {
                    if !self.quiet {
                        tracing::info!("Retraining the model");
                    }
                    self.trainer.retrain().await.map(|()| None)
                }
            };

            match outcome {
                Ok(Some(record)) => {
                    if let (Some(ms), Some(root)) = (record.execution_time(), record.plan()) {
                        tracing::debug!(
                            nodes = root.node_count(),
                            "Measured {} in {}",
                            root.label(),
                            format_duration_ms(ms)
                        );
                    }
                    results.push(record);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!("Aborting workload after {} results: {}", results.len(), err);
                    return WorkloadRun {
                        results,
                        failure: Some(err),
                    };
                }
            }
        }

        WorkloadRun {
            results,
            failure: None,
        }
    }
}
