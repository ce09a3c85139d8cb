/// Analyzer Engine - Abstraction for the External Similarity Tool
///
/// **Core Responsibility:**
/// Run the analyzer over a staged workspace and report how the process ended.
///
/// **Architectural Boundary:**
/// - Engine knows HOW to run the analyzer (Docker container, bind mount, deadline)
/// - Engine does NOT locate or parse the analyzer's output
/// - Engine does NOT know about submissions, authors or similarity tiers
///
/// A non-zero exit is not an error here: the analyzer may still have written a
/// usable result set, so the exit code is handed back for the pipeline to judge.

use crate::error::PipelineError;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use plagiarism_common::config::ToolConfig;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lines of analyzer output kept on a non-zero-exit diagnostic
pub const LOG_TAIL_LINES: usize = 20;

/// One analyzer run over a staged workspace
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    pub run_token: Uuid,
    pub language_code: &'a str,
    pub submissions_dir: &'a Path,
    pub results_dir: &'a Path,
    pub deadline: Duration,
}

/// How the analyzer process ended within its deadline
#[derive(Debug, Clone, Default)]
pub struct ToolInvocation {
    pub exit_code: Option<i64>,
    /// Combined stdout/stderr in arrival order
    pub log: String,
    pub elapsed: Duration,
}

impl ToolInvocation {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn log_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.log.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Capability to run the similarity analyzer.
///
/// Implementations must return `PipelineError::InvocationTimeout` once
/// `request.deadline` has passed and must not leave the analyzer running
/// afterwards. Dropping the returned future must also stop the analyzer.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<ToolInvocation, PipelineError>;
}

/// Container cleanup guard - guarantees container removal on drop.
/// Removal is forced, so a still-running analyzer is killed too.
struct ContainerGuard {
    docker: Docker,
    container_id: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        // Cannot be async in Drop
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };

            if let Err(e) = docker.remove_container(&container_id, Some(remove_options)).await {
                warn!(container_id = %container_id, error = %e, "Failed to remove analyzer container");
            }
        });
    }
}

/// Docker-based analyzer runner
///
/// **Execution Rules:**
/// 1. Pulls the analyzer image once, in `prepare`, before any run starts
/// 2. Bind-mounts the shared base directory at the configured mount point so
///    host and container paths agree
/// 3. Runs `-l <language> <submissions> -r <results>` with networking disabled
/// 4. Captures combined stdout/stderr
/// 5. Kills the container once the deadline passes
/// 6. Removes the container on every exit path
pub struct DockerAnalyzer {
    docker: Docker,
    config: ToolConfig,
}

impl DockerAnalyzer {
    pub fn connect(config: &ToolConfig) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| anyhow::anyhow!("Failed to connect to Docker daemon: {}", e))?;

        Ok(Self {
            docker,
            config: config.clone(),
        })
    }

    /// Analyzer arguments, with staging paths translated to container paths
    pub fn command_args(
        config: &ToolConfig,
        request: &AnalysisRequest<'_>,
    ) -> Result<Vec<String>, PipelineError> {
        let to_container = |host: &Path| {
            config
                .container_path(host)
                .map(|p| p.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    PipelineError::ToolUnavailable(format!(
                        "{} is not under the shared base directory {}",
                        host.display(),
                        config.base_dir.display()
                    ))
                })
        };

        Ok(vec![
            "-l".to_string(),
            request.language_code.to_string(),
            to_container(request.submissions_dir)?,
            "-r".to_string(),
            to_container(request.results_dir)?,
        ])
    }

    /// Pull the analyzer image if it is not cached yet. Called at startup so a
    /// slow pull never eats into a run's deadline.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        self.ensure_image(&self.config.docker_image).await
    }

    /// Ensure the analyzer image is available (pull if needed)
    async fn ensure_image(&self, image: &str) -> Result<(), PipelineError> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!("✓ Image cache hit: {}", image);
            return Ok(());
        }

        warn!("⚠ Image cache miss: {} (pulling now)", image);

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| {
                PipelineError::ToolUnavailable(format!("failed to pull image {}: {}", image, e))
            })?;
        }

        info!("✓ Image pulled successfully: {}", image);
        Ok(())
    }

    /// Follow container logs until exit, then read the exit code
    async fn collect(&self, container_id: &str) -> (String, Option<i64>) {
        let mut log = String::new();

        let logs_options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        });

        let mut logs_stream = self.docker.logs(container_id, logs_options);
        while let Some(output) = logs_stream.next().await {
            match output {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    log.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(container_id = %container_id, error = %e, "Error reading analyzer logs");
                    break;
                }
            }
        }

        let wait_options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut wait_stream = self.docker.wait_container(container_id, Some(wait_options));
        let exit_code = match wait_stream.next().await {
            Some(Ok(response)) => Some(response.status_code),
            // bollard reports non-zero exits as a wait error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Some(code),
            Some(Err(e)) => {
                warn!(container_id = %container_id, error = %e, "Failed to get analyzer exit code");
                None
            }
            None => None,
        };

        (log, exit_code)
    }
}

#[async_trait]
impl Analyzer for DockerAnalyzer {
    #[tracing::instrument(skip(self, request), fields(run_token = %request.run_token, language = %request.language_code))]
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<ToolInvocation, PipelineError> {
        let cmd = Self::command_args(&self.config, request)?;
        let image = self.config.docker_image.clone();

        // No pulling here: the run's deadline only covers the analyzer itself
        self.docker.inspect_image(&image).await.map_err(|e| {
            PipelineError::ToolUnavailable(format!("image {} is not available: {}", image, e))
        })?;

        let bind = format!(
            "{}:{}",
            self.config.base_dir.display(),
            self.config.container_mount.display()
        );

        let config = Config {
            image: Some(image.clone()),
            cmd: Some(cmd.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                binds: Some(vec![bind]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container_name = format!("plagiarism-{}", request.run_token);
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| PipelineError::ToolUnavailable(format!("failed to create container: {}", e)))?;

        let container_id = container.id.clone();
        let _guard = ContainerGuard {
            docker: self.docker.clone(),
            container_id: container_id.clone(),
        };

        info!(image = %image, args = %cmd.join(" "), "Starting analyzer");
        let start_time = Instant::now();

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| PipelineError::ToolUnavailable(format!("failed to start container: {}", e)))?;

        match tokio::time::timeout(request.deadline, self.collect(&container_id)).await {
            Ok((log, exit_code)) => {
                let elapsed = start_time.elapsed();
                debug!(
                    exit_code = ?exit_code,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Analyzer finished"
                );
                Ok(ToolInvocation {
                    exit_code,
                    log,
                    elapsed,
                })
            }
            Err(_) => {
                warn!(
                    deadline_secs = request.deadline.as_secs(),
                    "Analyzer exceeded deadline - killing container"
                );

                // Kill before returning so nothing writes into the workspace
                // while it is being removed
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container_id = %container_id, error = %e, "Failed to kill timed-out analyzer");
                }

                Err(PipelineError::InvocationTimeout {
                    timeout_seconds: request.deadline.as_secs(),
                })
            }
        }
    }
}
