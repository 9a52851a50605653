//! Job body for `[[jobs]]` entries: run a shell command to completion.

use anyhow::{bail, Context};
use tracing::debug;

/// Run `command` under `sh -c`. A non-zero exit is the job's failure.
pub async fn run_command(command: String) -> anyhow::Result<()> {
    let out = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to launch `{command}`"))?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    if !stdout.trim().is_empty() {
        debug!(command = %command, stdout = %stdout.trim(), "command output");
    }

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        let code = out.status.code().unwrap_or(-1);
        if stderr.trim().is_empty() {
            bail!("`{command}` exited with status {code}");
        }
        bail!("`{command}` exited with status {code}: {}", stderr.trim());
    }
    Ok(())
}
