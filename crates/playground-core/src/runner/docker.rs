//! Stream-capture runner speaking to the Docker daemon via bollard.

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::default::Default;
use std::path::PathBuf;
use uuid::Uuid;

use super::{ContainerResult, ContainerRunner};
use crate::config::CONTAINER_MOUNT;
use crate::errors::RunnerError;

/// Invokes images through the local Docker daemon, with the exchange
/// directory bind-mounted at the fixed in-container path.
///
/// The container is waited to termination *before* its logs are drained, so
/// the exit code is resolved exactly once and the captured streams are the
/// complete output of the run. Resolving on the first output chunk instead
/// would truncate output and race an unterminated process.
pub struct DockerRunner {
    docker: Docker,
    exchange_dir: PathBuf,
    platform: Option<String>,
}

impl DockerRunner {
    pub fn new(exchange_dir: PathBuf, platform: Option<String>) -> Result<Self, RunnerError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            exchange_dir,
            platform,
        })
    }

    fn create_options(&self) -> BollardCreateContainerOptionsQuery {
        BollardCreateContainerOptionsQuery {
            name: Some(format!("playground-{}", Uuid::new_v4())),
            // Forced emulation target on non-native hosts, e.g. linux/amd64
            // when the service runs on arm64. The daemon treats an empty
            // platform as "no override".
            platform: self.platform.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    async fn run(&self, image: &str, args: &[String]) -> Result<ContainerResult, RunnerError> {
        log::info!("Running container image {}", image);

        let options = Some(self.create_options());

        let config = ContainerCreateBody {
            image: Some(image.to_string()),
            cmd: Some(args.to_vec()),
            host_config: Some(bollard::models::HostConfig {
                binds: Some(vec![format!(
                    "{}:{}",
                    self.exchange_dir.display(),
                    CONTAINER_MOUNT
                )]),
                auto_remove: Some(true),
                ..Default::default()
            }),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let container = self.docker.create_container(options, config).await?;
        self.docker
            .start_container(&container.id, None::<BollardStartContainerOptionsQuery>)
            .await?;

        // wait_container returns a stream; the first item carries the exit
        // status once the container has terminated.
        let mut wait_stream = self
            .docker
            .wait_container(&container.id, None::<BollardWaitContainerOptionsQuery>);

        let exit_code = match wait_stream.next().await {
            Some(Ok(response)) => response.status_code,
            // The daemon reports a nonzero exit through an error variant
            // that still carries the status code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => return Err(RunnerError::BollardError(e)),
            None => return Err(RunnerError::MissingExitStatus),
        };

        let mut log_stream = self.docker.logs(
            &container.id,
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(log_result) = log_stream.next().await {
            match log_result {
                // Lossy decoding: user code is free to print arbitrary
                // bytes, and mangled characters beat a failed request.
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message))
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message))
                }
                Ok(_) => {}
                Err(e) => return Err(RunnerError::BollardError(e)),
            }
        }

        log::debug!("Container image {} exited with code {}", image, exit_code);

        Ok(ContainerResult {
            exit_code,
            stdout,
            stderr,
        })
    }
}
