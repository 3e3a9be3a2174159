use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::db::{DatabaseFailure, Session};
use crate::error::{Result, WorkloadError};
use crate::trainer::ModelTrainer;

/// Ordered log shared between fakes, so tests can check interleaving.
pub type Trace = Arc<Mutex<Vec<String>>>;

pub const RETRAIN_MARK: &str = "<retrain>";

/// Session that records every statement and answers plan requests with a
/// small document echoing the statement.
#[derive(Debug, Default)]
pub struct RecordingSession {
    pub executed: Vec<String>,
    trace: Option<Trace>,
    fail_pattern: Option<String>,
}

impl RecordingSession {
    pub fn with_trace(trace: Trace) -> Self {
        Self {
            trace: Some(trace),
            ..Self::default()
        }
    }

    /// Fail every statement containing `pattern`.
    pub fn fail_on(&mut self, pattern: &str) {
        self.fail_pattern = Some(pattern.to_string());
    }

    fn record(&mut self, sql: &str) -> Result<()> {
        if let Some(pattern) = &self.fail_pattern {
            if sql.contains(pattern.as_str()) {
                return Err(WorkloadError::Database(DatabaseFailure::from_string(
                    "injected failure",
                    sql,
                )));
            }
        }
        self.executed.push(sql.to_string());
        if let Some(trace) = &self.trace {
            trace.lock().unwrap().push(sql.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.record(sql)
    }

    async fn query_plan(&mut self, sql: &str) -> Result<Value> {
        self.record(sql)?;
        Ok(json!([{
            "Plan": {"Node Type": "Seq Scan"},
            "Statement": sql,
            "Execution Time": 1.0
        }]))
    }
}

#[derive(Debug, Default)]
pub struct RecordingTrainer {
    pub invocations: usize,
    trace: Option<Trace>,
    fail: bool,
}

impl RecordingTrainer {
    pub fn with_trace(trace: Trace) -> Self {
        Self {
            trace: Some(trace),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ModelTrainer for RecordingTrainer {
    async fn retrain(&mut self) -> Result<()> {
        self.invocations += 1;
        if self.fail {
            return Err(WorkloadError::Trainer(String::from("exit status: 1")));
        }
        if let Some(trace) = &self.trace {
            trace.lock().unwrap().push(RETRAIN_MARK.to_string());
        }
        Ok(())
    }
}
