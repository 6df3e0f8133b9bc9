//! Indirection runner for hosts that can only reach the container runtime
//! through a relay process.
//!
//! Some deployments cannot spawn the runtime directly; a relay program
//! executes a shell line remotely and hands back nothing but text, so the
//! native exit code of the run is unreachable. The workaround is to make
//! the shell persist it: the invocation redirects the combined output into
//! a log file inside the exchange directory and writes `$?` to a status
//! side file, then both files are read back through the shared volume and
//! removed unconditionally.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use uuid::Uuid;

use super::{ContainerResult, ContainerRunner};
use crate::config::CONTAINER_MOUNT;
use crate::errors::RunnerError;

pub struct RelayRunner {
    /// Program that executes a shell line, e.g. `sh` locally or an ssh-like
    /// relay remotely. Receives `relay_args` followed by the shell line.
    relay_program: String,
    relay_args: Vec<String>,
    /// Container runtime binary named inside the shell line.
    runtime: String,
    exchange_dir: PathBuf,
    platform: Option<String>,
}

impl RelayRunner {
    pub fn new(exchange_dir: PathBuf, platform: Option<String>) -> Self {
        Self {
            relay_program: "sh".to_string(),
            relay_args: vec!["-c".to_string()],
            runtime: "docker".to_string(),
            exchange_dir,
            platform,
        }
    }

    pub fn with_relay(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.relay_program = program.into();
        self.relay_args = args;
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// The shell line handed to the relay. Output is redirected rather than
    /// captured because the relay only returns its own text, and `$?` is
    /// persisted because the relay swallows the runtime's exit status.
    fn shell_line(&self, image: &str, args: &[String], log: &Path, status: &Path) -> String {
        let platform = self
            .platform
            .as_ref()
            .map(|p| format!("--platform {} ", p))
            .unwrap_or_default();
        format!(
            "{} run -v {}:{} {}{} {} > {} 2>&1; echo $? > {}",
            self.runtime,
            self.exchange_dir.display(),
            CONTAINER_MOUNT,
            platform,
            image,
            args.join(" "),
            log.display(),
            status.display(),
        )
    }

    /// Read log and status side files back, then remove both no matter what
    /// the reads produced. Leaked side files would accumulate in the
    /// exchange directory forever, so removal is not conditional on
    /// anything.
    async fn consume_side_files(
        log: &Path,
        status: &Path,
    ) -> Result<(String, i64), RunnerError> {
        let output = tokio::fs::read(log).await;
        let status_text = tokio::fs::read_to_string(status).await;

        if let Err(e) = tokio::fs::remove_file(log).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove log side file {}: {}", log.display(), e);
            }
        }
        if let Err(e) = tokio::fs::remove_file(status).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove status side file {}: {}",
                    status.display(),
                    e
                );
            }
        }

        // Lossy decoding: user code may print arbitrary bytes into the
        // log, and mangled characters beat a failed request.
        let output = String::from_utf8_lossy(&output?).into_owned();
        let exit_code = status_text
            .map_err(|e| RunnerError::StatusFileError(e.to_string()))?
            .trim()
            .parse::<i64>()
            .map_err(|e| RunnerError::StatusFileError(e.to_string()))?;
        Ok((output, exit_code))
    }
}

#[async_trait]
impl ContainerRunner for RelayRunner {
    async fn run(&self, image: &str, args: &[String]) -> Result<ContainerResult, RunnerError> {
        log::info!("Running container image {} through relay", image);

        let invocation = Uuid::new_v4();
        let log_file = self.exchange_dir.join(format!("log_{}.log", invocation));
        let status_file = self
            .exchange_dir
            .join(format!("status_{}.txt", invocation));

        let line = self.shell_line(image, args, &log_file, &status_file);
        log::debug!("Relay shell line: {}", line);

        let spawn_result = Command::new(&self.relay_program)
            .args(&self.relay_args)
            .arg(&line)
            .output()
            .await;

        // Side files may exist even when the relay itself reported failure;
        // consume (and remove) them before deciding anything.
        let consumed = Self::consume_side_files(&log_file, &status_file).await;

        let relay_output = spawn_result?;
        if !relay_output.status.success() {
            let stderr = String::from_utf8_lossy(&relay_output.stderr);
            return Err(RunnerError::RelayError(format!(
                "relay exited with {}: {}",
                relay_output.status, stderr
            )));
        }

        let (output, exit_code) = consumed?;
        log::debug!("Container image {} exited with code {}", image, exit_code);

        // The redirection merges both streams into the log file, so the
        // combined text is surfaced as stdout.
        Ok(ContainerResult {
            exit_code,
            stdout: output,
            stderr: String::new(),
        })
    }
}
