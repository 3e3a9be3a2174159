//! Control of the Bao server process: model retraining and full resets.
//!
//! Both go through the scripts shipped with the Bao server. Calls block the
//! workload until the child process exits; no timeout is applied, so a hung
//! training run stalls the whole workload.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::BaoSettings;
use crate::error::{Result, WorkloadError};

/// Updates the Bao model from the experience collected so far.
#[async_trait]
pub trait ModelTrainer: Send {
    /// Returns once the new model is in place for subsequent statements.
    async fn retrain(&mut self) -> Result<()>;
}

/// Retrains by running `baoctl.py --retrain` inside the Bao server directory.
#[derive(Debug, Clone)]
pub struct ScriptTrainer {
    settings: BaoSettings,
    quiet: bool,
}

impl ScriptTrainer {
    pub fn new(settings: BaoSettings, quiet: bool) -> Self {
        Self { settings, quiet }
    }

    fn retrain_command(&self) -> Command {
        let mut cmd = Command::new(&self.settings.python);
        cmd.arg("baoctl.py")
            .arg("--retrain")
            .current_dir(&self.settings.server_dir)
            // training runs on the CPU
            .env("CUDA_VISIBLE_DEVICES", "");
        cmd
    }
}

#[async_trait]
impl ModelTrainer for ScriptTrainer {
    async fn retrain(&mut self) -> Result<()> {
        run_checked(self.retrain_command(), "baoctl.py --retrain", self.quiet, self.quiet).await?;
        flush_filesystem().await;
        Ok(())
    }
}

/// Discard everything Bao has learned and restart PostgreSQL and the Bao server.
pub async fn reset_bao(settings: &BaoSettings, quiet: bool) -> Result<()> {
    run_checked(
        Command::new(&settings.shutdown_script),
        "shutdown script",
        quiet,
        false,
    )
    .await?;

    let removed = clear_model_state(&settings.server_dir)?;
    tracing::info!("Removed {} Bao state entries", removed);

    let mut start = Command::new(&settings.start_script);
    start.arg("--no-env");
    run_checked(start, "start script", quiet, false).await
}

/// Remove the experience database and all persisted models from `server_dir`.
/// Returns how many entries were removed; absent entries are not an error.
pub fn clear_model_state(server_dir: &Path) -> Result<usize> {
    let mut removed = 0;

    match std::fs::remove_file(server_dir.join("bao.db")) {
        Ok(()) => removed += 1,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if !server_dir.is_dir() {
        return Ok(removed);
    }
    for entry in std::fs::read_dir(server_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("bao_") && name.ends_with("_model") {
            let path = entry.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            removed += 1;
        }
    }

    Ok(removed)
}

async fn run_checked(mut cmd: Command, what: &str, hide_stdout: bool, hide_stderr: bool) -> Result<()> {
    if hide_stdout {
        cmd.stdout(Stdio::null());
    }
    if hide_stderr {
        cmd.stderr(Stdio::null());
    }

    tracing::debug!(?cmd, "Running {}", what);
    let status = cmd
        .status()
        .await
        .map_err(|e| WorkloadError::Trainer(format!("failed to start {}: {}", what, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(WorkloadError::Trainer(format!("{} exited with {}", what, status)))
    }
}

/// Persist the freshly written model before the next statement reads it.
async fn flush_filesystem() {
    if cfg!(unix) {
        if let Err(e) = Command::new("sync").status().await {
            tracing::warn!("sync failed: {}", e);
        }
    }
}
