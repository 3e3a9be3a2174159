use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::{Client, SimpleQueryMessage};

use crate::error::{Result, WorkloadError};

/// The statement-level surface of a database connection used by a workload run.
///
/// All statements go through the simple query protocol, so session settings
/// and workload statements are sent exactly as written.
#[async_trait]
pub trait Session: Send {
    /// Issue `sql` and discard any rows it produces.
    async fn batch_execute(&mut self, sql: &str) -> Result<()>;

    /// Issue a plan-inspecting statement and return the JSON document held in
    /// the first column of its single result row.
    async fn query_plan(&mut self, sql: &str) -> Result<Value>;
}

#[async_trait]
impl Session for Client {
    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        Client::batch_execute(self, sql)
            .await
            .map_err(|e| WorkloadError::database(&e, sql))
    }

    async fn query_plan(&mut self, sql: &str) -> Result<Value> {
        let messages = self
            .simple_query(sql)
            .await
            .map_err(|e| WorkloadError::database(&e, sql))?;

        let first_column = messages.iter().find_map(|msg| match msg {
            SimpleQueryMessage::Row(row) => row.get(0),
            _ => None,
        });
        decode_plan(first_column, sql)
    }
}

/// Parse the first column of a measurement run's first row. No row, or a
/// NULL column, means the statement produced no plan.
pub fn decode_plan(first_column: Option<&str>, sql: &str) -> Result<Value> {
    let text = first_column.ok_or_else(|| WorkloadError::MissingPlan(sql.to_string()))?;
    Ok(serde_json::from_str(text)?)
}
