//! Running the wrapped command behind a proxy.

use crate::config::Config;
use crate::error::{Error, Result};

use async_trait::async_trait;
use log::{debug, info, warn};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Runs a command with a proxy exposed to it.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `proxy_address` exposed through the environment and return its exit code.
    async fn run(&self, command: &[String], proxy_address: &str) -> Result<i32>;
}

/// Runs the command through the system shell and forwards its output to the log.
///
/// The command tokens are joined with spaces, so pipes, redirections and shell
/// builtins work, and a missing program shows up as a non-zero exit code.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Environment variables set to the proxy address.
    exposed_env_vars: Vec<String>,
}

impl ProcessRunner {
    pub fn new(exposed_env_vars: Vec<String>) -> Self {
        Self { exposed_env_vars }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.exposed_env_vars.clone())
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &[String], proxy_address: &str) -> Result<i32> {
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }
        let script = command.join(" ");

        debug!("Spawning {:?} with {} = {}", script, self.exposed_env_vars.join(","), proxy_address);

        let mut child = shell_command(&script)
            .envs(self.exposed_env_vars.iter().map(|name| (name, proxy_address)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::try_join!(forward_lines(stdout), forward_lines(stderr))?;

        let status = child.wait().await?;
        match status.code() {
            Some(code) => Ok(code),
            None => {
                warn!("Command terminated without an exit code ({})", status);
                Ok(-1)
            }
        }
    }
}

#[cfg(unix)]
fn shell_command(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

#[cfg(windows)]
fn shell_command(script: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(script);
    command
}

/// Log every line read from `reader` as it arrives.
async fn forward_lines<R>(reader: Option<R>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };

    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        info!("{}", String::from_utf8_lossy(&line).trim());
    }
}
