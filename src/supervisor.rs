//! Starts the proxy binary next to the synchronizer.
//!
//! The child inherits stdout/stderr so its logs interleave with ours.
//! It is not restarted: if it dies, the next admin API call fails and
//! the synchronizer exits with it.

use std::process::Stdio;
use std::time::Duration;

use log::info;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::sleep;

use crate::config::ProxyProcess;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub async fn spawn_proxy(proxy: &ProxyProcess) -> Result<Child, SupervisorError> {
    let child = Command::new(&proxy.command)
        .args(&proxy.args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            command: proxy.command.clone(),
            source,
        })?;
    info!(
        "Started {} {} (pid {:?})",
        proxy.command,
        proxy.args.join(" "),
        child.id()
    );

    // Give the admin endpoint time to come up.
    sleep(Duration::from_millis(proxy.startup_delay_ms)).await;
    Ok(child)
}
