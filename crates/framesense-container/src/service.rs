//! Long-lived containerized services.
//!
//! A [`ServiceManager`] owns at most one running service per operator. Starting
//! a service spawns the engine in the foreground and waits until the readiness
//! marker shows up on stdout or stderr. Two reader tasks feed the output lines
//! into a bounded channel; the starter races that channel against process exit
//! and the startup deadline.
//!
//! ```text
//! Stopped ──start──▶ Starting ──marker──▶ Ready ──stop──▶ Stopped
//!                       │
//!                       └──exit / timeout──▶ Failed
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::EngineRegistry;
use crate::invocation::{RunSpec, ServiceInvocation};
use crate::{Error, Result};

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// How long to keep collecting output after the process exited.
const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Service naming and readiness settings.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Services are named `<prefix>_<operator>_service`.
    pub name_prefix: String,
    /// Substring of an output line that means the service accepts requests.
    pub ready_marker: String,
    /// Extra wait after the marker before the first request.
    pub ready_grace: Duration,
    /// Give up if the marker has not appeared by then.
    pub startup_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            name_prefix: "framesense".to_string(),
            ready_marker: "Running on".to_string(),
            ready_grace: Duration::from_millis(1000),
            startup_timeout: Duration::from_secs(1800),
        }
    }
}

/// Lifecycle state of the managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Ready,
    Failed,
}

struct ServiceHandle {
    child: Child,
    output: Vec<String>,
    bound_root: Option<PathBuf>,
    drain: JoinHandle<()>,
}

/// Deterministic service name for `operator`.
pub fn service_name(prefix: &str, operator: &str) -> String {
    format!("{prefix}_{operator}_service")
}

/// Starts, reuses, and stops the service of one operator.
pub struct ServiceManager {
    registry: Arc<EngineRegistry>,
    options: ServiceOptions,
    name: String,
    state: ServiceState,
    handle: Option<ServiceHandle>,
}

impl ServiceManager {
    pub fn new(registry: Arc<EngineRegistry>, operator: &str, options: ServiceOptions) -> Self {
        let name = service_name(&options.name_prefix, operator);
        Self {
            registry,
            options,
            name,
            state: ServiceState::Stopped,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Collection root the running service was started for.
    pub fn bound_root(&self) -> Option<&Path> {
        self.handle.as_ref().and_then(|h| h.bound_root.as_deref())
    }

    /// Output captured while the service was starting.
    pub fn startup_output(&self) -> &[String] {
        self.handle.as_ref().map_or(&[][..], |h| h.output.as_slice())
    }

    /// Start the service described by `spec`, stopping any previous one.
    ///
    /// Returns once the readiness marker has been seen and the grace period
    /// has passed.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceStartup`] if the process exits before it is ready;
    ///   carries everything it printed.
    /// - [`Error::ServiceTimeout`] if the marker never appears.
    /// - [`Error::CommandFailed`] if a Singularity instance cannot be started.
    pub async fn start(&mut self, spec: &RunSpec, bound_root: Option<PathBuf>) -> Result<()> {
        self.stop().await?;
        self.state = ServiceState::Starting;
        tracing::info!("Starting service {}", self.name);

        match self.launch(spec).await {
            Ok(mut handle) => {
                handle.bound_root = bound_root;
                self.handle = Some(handle);
                self.state = ServiceState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = ServiceState::Failed;
                self.discard_leftover().await;
                Err(e)
            }
        }
    }

    /// Make sure a ready service bound to `root` is running. A service bound
    /// to another root is restarted with `spec`. Returns whether a start
    /// happened.
    pub async fn ensure_bound(&mut self, root: &Path, spec: &RunSpec) -> Result<bool> {
        if self.state == ServiceState::Ready {
            if let Some(handle) = self.handle.as_mut() {
                let alive = handle.child.try_wait()?.is_none();
                if alive && handle.bound_root.as_deref() == Some(root) {
                    return Ok(false);
                }
                if !alive {
                    tracing::warn!("Service {} exited, restarting", self.name);
                }
            }
        }

        self.start(spec, Some(root.to_path_buf())).await?;
        Ok(true)
    }

    /// Whether the engine lists a service with our name.
    pub async fn is_running(&self) -> Result<bool> {
        let args = self.registry.engine().list_args(&self.name);
        let output = self.registry.run(&args).await?;
        Ok(output
            .stdout
            .lines()
            .flat_map(str::split_whitespace)
            .any(|word| word == self.name))
    }

    /// Stop the service if it runs and forget everything about it.
    /// Calling this with nothing running is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        let result = self.stop_engine_instance().await;

        if let Some(mut handle) = self.handle.take() {
            handle.drain.abort();
            // start_kill fails when the process already exited
            let _ = handle.child.start_kill();
            let _ = tokio::time::timeout(KILL_TIMEOUT, handle.child.wait()).await;
        }
        self.state = ServiceState::Stopped;
        result
    }

    async fn stop_engine_instance(&self) -> Result<()> {
        if self.is_running().await? {
            tracing::info!("Stopping service {}", self.name);
            let args = self.registry.engine().stop_args(&self.name);
            if let Err(e) = self.registry.run(&args).await {
                // the container may exit on its own between listing and stopping
                if self.is_running().await? {
                    return Err(e);
                }
                tracing::debug!("Service {} was already gone: {e}", self.name);
            }
        }
        Ok(())
    }

    async fn discard_leftover(&self) {
        if let Err(e) = self.stop_engine_instance().await {
            tracing::warn!("Failed to clean up service {}: {e}", self.name);
        }
    }

    async fn launch(&self, spec: &RunSpec) -> Result<ServiceHandle> {
        let args = match self.registry.engine().service_args(spec, &self.name) {
            ServiceInvocation::Single(args) => args,
            ServiceInvocation::Instance { start, exec } => {
                self.registry.run(&start).await?;
                exec
            }
        };

        let program = self.registry.program();
        self.registry.runner().trace(program, &args);
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::spawn(program.display().to_string(), e))?;

        let (tx, mut rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, tx.clone());
        }
        drop(tx);

        let mut output = Vec::new();
        self.wait_ready(&mut child, &mut rx, &mut output).await?;

        let drain = tokio::spawn(drain_output(self.name.clone(), rx));
        Ok(ServiceHandle {
            child,
            output,
            bound_root: None,
            drain,
        })
    }

    async fn wait_ready(
        &self,
        child: &mut Child,
        rx: &mut mpsc::Receiver<String>,
        output: &mut Vec<String>,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.options.startup_timeout;
        let mut streams_open = true;

        loop {
            tokio::select! {
                line = rx.recv(), if streams_open => match line {
                    Some(line) => {
                        tracing::debug!("[{}] {line}", self.name);
                        let ready = line.contains(&self.options.ready_marker);
                        output.push(line);
                        if ready {
                            tokio::time::sleep(self.options.ready_grace).await;
                            if child.try_wait()?.is_some() {
                                return Err(self.startup_failed(rx, output).await);
                            }
                            tracing::info!("Service {} is ready", self.name);
                            return Ok(());
                        }
                    }
                    None => streams_open = false,
                },
                status = child.wait() => {
                    tracing::debug!("Service {} exited with {}", self.name, status?);
                    return Err(self.startup_failed(rx, output).await);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::ServiceTimeout {
                        name: self.name.clone(),
                        timeout: self.options.startup_timeout,
                    });
                }
            }
        }
    }

    async fn startup_failed(
        &self,
        rx: &mut mpsc::Receiver<String>,
        output: &mut Vec<String>,
    ) -> Error {
        while let Ok(Some(line)) = tokio::time::timeout(EXIT_DRAIN_TIMEOUT, rx.recv()).await {
            output.push(line);
        }
        Error::ServiceStartup {
            name: self.name.clone(),
            output: output.join("\n"),
        }
    }
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("bound_root", &self.bound_root())
            .finish()
    }
}

fn spawn_line_reader<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

async fn drain_output(name: String, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        tracing::debug!("[{name}] {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContainerEngine, EngineOptions};

    #[test]
    fn test_service_name() {
        assert_eq!(
            service_name("framesense", "embed_frames_transformers"),
            "framesense_embed_frames_transformers_service"
        );
    }

    #[tokio::test]
    async fn test_new_manager_is_stopped() {
        let registry = Arc::new(EngineRegistry::with_binary(
            ContainerEngine::Docker,
            "docker",
            EngineOptions::default(),
        ));
        let manager = ServiceManager::new(registry, "embed", ServiceOptions::default());
        assert_eq!(manager.state(), ServiceState::Stopped);
        assert_eq!(manager.name(), "framesense_embed_service");
        assert!(manager.bound_root().is_none());
        assert!(manager.startup_output().is_empty());
    }
}
