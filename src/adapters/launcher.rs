//! Process launcher.
//!
//! Starts a role as a child of the current executable. The trade key
//! crosses the process boundary in `BANSHIELD_TRADE_KEY` so it never
//! shows up in the process list.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};

use crate::ports::launcher::{WorkerLaunch, WorkerLauncher};

/// Environment variable carrying the trade key to a child role.
pub const TRADE_KEY_ENV: &str = "BANSHIELD_TRADE_KEY";

/// Environment switch forcing simulate-only mode in a child role.
pub const DRY_RUN_ENV: &str = "BANSHIELD_DRY_RUN";

/// `WorkerLauncher` spawning `banshield <subcommand>` processes.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    exe: PathBuf,
    config_path: String,
}

impl ProcessLauncher {
    /// Launch children of the running executable with the same config.
    ///
    /// # Errors
    /// Returns error if the executable path cannot be determined.
    pub fn current(config_path: &str) -> Result<Self> {
        let exe = std::env::current_exe().context("Cannot locate own executable")?;
        Ok(Self::new(exe, config_path))
    }

    pub fn new(exe: PathBuf, config_path: &str) -> Self {
        Self {
            exe,
            config_path: config_path.to_string(),
        }
    }

    /// Arguments and extra environment for `launch`.
    fn invocation(&self, launch: &WorkerLaunch) -> (Vec<String>, Vec<(&'static str, String)>) {
        let args = vec![
            "--config".to_string(),
            self.config_path.clone(),
            launch.subcommand().to_string(),
        ];
        let mut env = Vec::new();
        if let Some(key) = launch.key() {
            env.push((TRADE_KEY_ENV, key.expose().to_string()));
        }
        if matches!(launch, WorkerLaunch::Sender { simulate: true, .. }) {
            env.push((DRY_RUN_ENV, "1".to_string()));
        }
        (args, env)
    }

    fn command(&self, launch: &WorkerLaunch) -> Command {
        let (args, env) = self.invocation(launch);
        let mut cmd = Command::new(&self.exe);
        cmd.args(args).env_remove(TRADE_KEY_ENV).stdin(Stdio::null());
        for (name, value) in env {
            cmd.env(name, value);
        }
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    #[instrument(skip_all, fields(role = launch.subcommand()))]
    async fn launch_detached(&self, launch: &WorkerLaunch) -> Result<()> {
        let mut cmd = self.command(launch);
        #[cfg(unix)]
        cmd.process_group(0);
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to launch {}", launch.subcommand()))?;
        info!(pid = child.id(), "Role launched detached");
        // Dropping the handle leaves the child running; tokio reaps it.
        drop(child);
        Ok(())
    }

    #[instrument(skip_all, fields(role = launch.subcommand()))]
    async fn run_to_completion(&self, launch: &WorkerLaunch) -> Result<i32> {
        let status = self
            .command(launch)
            .status()
            .await
            .with_context(|| format!("Failed to run {}", launch.subcommand()))?;
        let code = status.code().unwrap_or(1);
        info!(code, "Role finished");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade_key::TradeKey;

    const KEY: &str = "Ab12cD34eF56gH78iJ90wXyZ";

    fn launcher() -> ProcessLauncher {
        ProcessLauncher::new(PathBuf::from("/usr/local/bin/banshield"), "prod.toml")
    }

    #[test]
    fn test_key_travels_in_env_not_args() {
        let key = TradeKey::parse(KEY).unwrap();
        let (args, env) = launcher().invocation(&WorkerLaunch::Receiver { key });
        assert_eq!(args, vec!["--config", "prod.toml", "accept"]);
        assert!(args.iter().all(|a| !a.contains(KEY)));
        assert_eq!(env, vec![(TRADE_KEY_ENV, KEY.to_string())]);
    }

    #[test]
    fn test_simulated_sender_sets_dry_run() {
        let key = TradeKey::parse(KEY).unwrap();
        let (args, env) = launcher().invocation(&WorkerLaunch::Sender { key, simulate: true });
        assert_eq!(args[2], "send");
        assert!(env.contains(&(DRY_RUN_ENV, "1".to_string())));
    }

    #[test]
    fn test_supervisor_without_key() {
        let (args, env) = launcher().invocation(&WorkerLaunch::Supervisor { key: None });
        assert_eq!(args[2], "supervise");
        assert!(env.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_to_completion_reports_exit_code() {
        let launcher = ProcessLauncher::new(PathBuf::from("/bin/sh"), "ignored");
        // `sh --config ignored supervise` fails: sh has no --config option.
        let code = launcher
            .run_to_completion(&WorkerLaunch::Supervisor { key: None })
            .await
            .unwrap();
        assert_ne!(code, 0);
    }
}
