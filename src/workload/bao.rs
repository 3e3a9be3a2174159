//! Session-level control of the Bao optimizer.
//!
//! Bao is configured through four settings on the current connection. Every
//! transition sends the complete setting set as one batch, `enable_bao` first,
//! so the session is never left with a mix of old and new values.

use crate::db::Session;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerMode {
    pub enabled: bool,
    pub reward_learning: bool,
    pub plan_selection: bool,
    pub arm_count: u32,
}

impl OptimizerMode {
    pub fn active(planning: bool, learning: bool, arm_count: u32) -> Self {
        Self {
            enabled: true,
            reward_learning: learning,
            plan_selection: planning,
            arm_count,
        }
    }

    pub fn disabled(arm_count: u32) -> Self {
        Self {
            enabled: false,
            reward_learning: false,
            plan_selection: false,
            arm_count,
        }
    }

    /// The batch of `SET` commands that puts a session into this mode.
    pub fn commands(&self) -> String {
        if !self.enabled {
            return String::from("SET enable_bao='off'");
        }
        format!(
            "SET enable_bao='on'; SET enable_bao_rewards='{}'; SET enable_bao_selection='{}'; SET bao_num_arms={}",
            on_off(self.reward_learning),
            on_off(self.plan_selection),
            self.arm_count
        )
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, Clone)]
pub struct BaoController {
    arm_count: u32,
    mode: Option<OptimizerMode>,
}

impl BaoController {
    pub fn new(arm_count: u32) -> Self {
        Self {
            arm_count,
            mode: None,
        }
    }

    /// The last mode successfully applied, `None` before the first transition.
    pub fn mode(&self) -> Option<OptimizerMode> {
        self.mode
    }

    pub async fn enable<S: Session + ?Sized>(
        &mut self,
        session: &mut S,
        planning: bool,
        learning: bool,
    ) -> Result<()> {
        self.apply(session, OptimizerMode::active(planning, learning, self.arm_count))
            .await
    }

    pub async fn disable<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<()> {
        self.apply(session, OptimizerMode::disabled(self.arm_count))
            .await
    }

    /// Only the PostgreSQL planner chooses plans; Bao keeps learning.
    pub async fn disable_planning<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<()> {
        self.enable(session, false, true).await
    }

    /// Bao chooses plans, but executed statements no longer feed its model.
    pub async fn disable_learning<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<()> {
        self.enable(session, true, false).await
    }

    async fn apply<S: Session + ?Sized>(&mut self, session: &mut S, mode: OptimizerMode) -> Result<()> {
        session.batch_execute(&mode.commands()).await?;
        tracing::debug!(?mode, "Bao mode applied");
        self.mode = Some(mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::testing::RecordingSession;

    #[test]
    fn test_enable_commands() {
        let mode = OptimizerMode::active(true, false, 5);
        assert_eq!(
            mode.commands(),
            "SET enable_bao='on'; SET enable_bao_rewards='off'; SET enable_bao_selection='on'; SET bao_num_arms=5"
        );
    }

    #[test]
    fn test_disable_commands() {
        assert_eq!(OptimizerMode::disabled(5).commands(), "SET enable_bao='off'");
    }

    #[tokio::test]
    async fn test_transitions_issue_full_batches() {
        let mut session = RecordingSession::default();
        let mut ctl = BaoController::new(12);
        assert!(ctl.mode().is_none());

        ctl.disable_planning(&mut session).await.unwrap();
        ctl.disable_learning(&mut session).await.unwrap();
        ctl.disable(&mut session).await.unwrap();

        assert_eq!(
            session.executed,
            vec![
                "SET enable_bao='on'; SET enable_bao_rewards='on'; SET enable_bao_selection='off'; SET bao_num_arms=12",
                "SET enable_bao='on'; SET enable_bao_rewards='off'; SET enable_bao_selection='on'; SET bao_num_arms=12",
                "SET enable_bao='off'",
            ]
        );
        assert_eq!(ctl.mode(), Some(OptimizerMode::disabled(12)));
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let mut session = RecordingSession::default();
        let mut ctl = BaoController::new(5);
        ctl.enable(&mut session, true, true).await.unwrap();
        ctl.enable(&mut session, true, true).await.unwrap();
        assert_eq!(session.executed[0], session.executed[1]);
        assert_eq!(ctl.mode(), Some(OptimizerMode::active(true, true, 5)));
    }

    #[tokio::test]
    async fn test_failed_transition_keeps_previous_mode() {
        let mut session = RecordingSession::default();
        let mut ctl = BaoController::new(5);
        ctl.disable(&mut session).await.unwrap();

        session.fail_on("enable_bao='on'");
        assert!(ctl.enable(&mut session, true, true).await.is_err());
        assert_eq!(ctl.mode(), Some(OptimizerMode::disabled(5)));
    }
}
