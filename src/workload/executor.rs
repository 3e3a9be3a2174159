use super::bao::BaoController;
use super::statement::Statement;
use crate::db::Session;
use crate::error::Result;
use crate::explain::PlanRecord;

/// Wrapper that turns a canonical statement into its measurement run.
pub const MEASUREMENT_PREFIX: &str = "EXPLAIN (ANALYZE, FORMAT JSON) ";

pub fn measurement_statement(canonical: &str) -> String {
    format!("{}{}", MEASUREMENT_PREFIX, canonical)
}

/// Runs single statements against one session, routing every workload
/// statement through the Bao controller.
pub struct QueryExecutor<S> {
    session: S,
    controller: BaoController,
}

impl<S: Session> QueryExecutor<S> {
    pub fn new(session: S, controller: BaoController) -> Self {
        Self {
            session,
            controller,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn controller(&self) -> &BaoController {
        &self.controller
    }

    /// Meta statements are sent verbatim and yield nothing. Workload
    /// statements run twice: a learning run of the canonical form with
    /// rewards set by `participates`, then an `EXPLAIN ANALYZE` measurement
    /// run with learning switched off, whose plan is returned.
    pub async fn execute(
        &mut self,
        statement: &Statement,
        participates: bool,
    ) -> Result<Option<PlanRecord>> {
        if !statement.is_workload() {
            self.session.batch_execute(statement.text()).await?;
            return Ok(None);
        }

        let canonical = statement.canonical();

        self.controller
            .enable(&mut self.session, true, participates)
            .await?;
        self.session.batch_execute(canonical).await?;

        self.controller.disable_learning(&mut self.session).await?;
        let plan = self
            .session
            .query_plan(&measurement_statement(canonical))
            .await?;

        Ok(Some(PlanRecord::new(plan)))
    }
}
