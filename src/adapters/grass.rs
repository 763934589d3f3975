use crate::domain::command::GisCommand;
use crate::domain::ports::GisRunner;
use crate::utils::error::{CommonsError, Result};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs host commands as child processes of the current GIS session.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    envs: Vec<(String, String)>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            envs: vec![("GRASS_MESSAGE_FORMAT".to_string(), "plain".to_string())],
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Last few lines of stderr; the host prints progress noise before the actual error.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

impl GisRunner for ProcessRunner {
    async fn run(&self, command: &GisCommand) -> Result<String> {
        tracing::debug!("Running: {}", command);

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let spawn_error = |source: std::io::Error| CommonsError::CommandSpawnError {
            program: command.program.clone(),
            source,
        };

        let mut child = process.spawn().map_err(spawn_error)?;

        // stdin is fed while stdout and stderr drain, or a chatty child stalls on a full pipe
        let feeder = match (&command.stdin, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => {
                let input = input.clone();
                Some(tokio::spawn(async move {
                    stdin.write_all(input.as_bytes()).await?;
                    stdin.shutdown().await
                }))
            }
            _ => None,
        };

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            tracing::error!("{} failed ({}): {}", command.program, output.status, stderr);
            return Err(CommonsError::CommandFailed {
                program: command.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        if let Some(feeder) = feeder {
            feeder.await.map_err(|e| CommonsError::ProcessingError {
                message: format!("writing input to {} failed: {}", command.program, e),
            })??;
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
