//! Container invocation for sandboxed stage execution.
//!
//! A runner invokes one pre-built isolated image with arguments and returns
//! the full result of the run: accumulated stdout, accumulated stderr, and
//! the process exit code, resolved exactly once when the container
//! terminates. Untrusted code only ever runs inside the image; the host
//! sees nothing but the exchange directory bind mount and the captured
//! streams.
//!
//! Two strategies exist with the same observable contract: [`DockerRunner`]
//! talks to the Docker daemon directly and captures streams natively, and
//! [`RelayRunner`] is the fallback for hosts where the runtime is only
//! reachable through a relay process that returns text, persisting the exit
//! status to a side file instead.

use async_trait::async_trait;

use crate::errors::RunnerError;

/// Outcome of one container invocation.
///
/// A nonzero `exit_code` is a normal result, not an error; `RunnerError` is
/// reserved for infrastructure failures. Streams hold the complete output
/// of the run, never a first-chunk prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ContainerResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The text propagated verbatim as a failure diagnostic: stderr when
    /// the stage wrote any, otherwise whatever landed on stdout.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Invoke `image` with `args` and block until it terminates.
    ///
    /// No timeout is enforced here; whatever deadline the request layer
    /// imposes is the only bound on a run.
    async fn run(&self, image: &str, args: &[String]) -> Result<ContainerResult, RunnerError>;
}

pub mod docker;
pub mod relay;

pub use docker::DockerRunner;
pub use relay::RelayRunner;
