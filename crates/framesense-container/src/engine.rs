//! Container engine detection.
//!
//! The [`EngineRegistry`] is built once at process start and shared by every
//! component that talks to the engine. It owns the resolved engine binary, the
//! command runner, and the memoized GPU probe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::command::CommandRunner;
use crate::{Error, Result};

/// A supported container engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerEngine {
    Docker,
    Singularity,
}

impl ContainerEngine {
    /// Engines in probing order.
    pub const ALL: [ContainerEngine; 2] = [ContainerEngine::Docker, ContainerEngine::Singularity];

    /// Name of the engine executable.
    pub fn binary(&self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Singularity => "singularity",
        }
    }
}

impl fmt::Display for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for ContainerEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(ContainerEngine::Docker),
            "singularity" => Ok(ContainerEngine::Singularity),
            other => Err(Error::UnknownEngine(other.to_string())),
        }
    }
}

/// Information about an installed engine binary.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    /// Name of the binary.
    pub name: String,
    /// Whether `--version` succeeded.
    pub available: bool,
    /// First line of the version output.
    pub version: Option<String>,
    /// Path to the executable.
    pub path: Option<PathBuf>,
}

/// Probe an engine binary with `--version`.
pub async fn check_engine(name: &str) -> EngineInfo {
    let output = Command::new(name)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => EngineInfo {
            name: name.to_string(),
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.trim().to_string()),
            path: which::which(name).ok(),
        },
        _ => EngineInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// First engine, in probing order, whose binary answers `--version`.
async fn probe_installed() -> Option<(ContainerEngine, EngineInfo)> {
    for engine in ContainerEngine::ALL {
        let info = check_engine(engine.binary()).await;
        if info.available {
            return Some((engine, info));
        }
    }
    None
}

/// Knobs for engine-level behaviour.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Variable listing visible GPUs; GPU flags are only passed when it is set
    /// and non-empty.
    pub gpu_env_var: String,
    /// Image used by the Docker `--gpus all` probe.
    pub gpu_probe_image: String,
    /// Log every command line at info level.
    pub debug: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            gpu_env_var: "CUDA_VISIBLE_DEVICES".to_string(),
            gpu_probe_image: "ubuntu".to_string(),
            debug: false,
        }
    }
}

/// The detected engine, shared read-only after construction.
#[derive(Debug)]
pub struct EngineRegistry {
    engine: ContainerEngine,
    program: PathBuf,
    version: Option<String>,
    options: EngineOptions,
    runner: CommandRunner,
    gpu: OnceCell<bool>,
}

impl EngineRegistry {
    /// Resolve the engine: the override when given, else the first engine
    /// whose binary answers `--version`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownEngine`] if the override names neither engine.
    /// - [`Error::NoEngine`] if nothing is installed.
    pub async fn detect(engine_override: Option<&str>, options: EngineOptions) -> Result<Self> {
        let forced = engine_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ContainerEngine::from_str)
            .transpose()?;

        let (engine, info) = match forced {
            Some(engine) => (engine, check_engine(engine.binary()).await),
            None => probe_installed().await.ok_or(Error::NoEngine)?,
        };

        if forced.is_some() && !info.available {
            tracing::warn!("Forced engine {engine} did not answer --version");
        }

        let program = info
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(engine.binary()));
        tracing::debug!(
            "Using container engine {engine} at {} ({})",
            program.display(),
            info.version.as_deref().unwrap_or("unknown version")
        );

        Ok(Self::with_binary(engine, program, options).with_version(info.version))
    }

    /// Use `program` as the binary for `engine` without probing.
    pub fn with_binary(
        engine: ContainerEngine,
        program: impl Into<PathBuf>,
        options: EngineOptions,
    ) -> Self {
        let runner = CommandRunner::new(options.debug);
        Self {
            engine,
            program: program.into(),
            version: None,
            options,
            runner,
            gpu: OnceCell::new(),
        }
    }

    fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn engine(&self) -> ContainerEngine {
        self.engine
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run the engine binary with `args`.
    pub async fn run(&self, args: &[String]) -> Result<crate::command::CommandOutput> {
        self.runner.run(&self.program, args).await
    }

    /// Whether containers should get GPU flags. Probed once per registry.
    pub async fn gpu_available(&self) -> bool {
        *self.gpu.get_or_init(|| self.probe_gpu()).await
    }

    async fn probe_gpu(&self) -> bool {
        let visible = std::env::var(&self.options.gpu_env_var)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if !visible {
            tracing::debug!("{} not set, running without GPU", self.options.gpu_env_var);
            return false;
        }

        let available = match self.engine {
            ContainerEngine::Singularity => true,
            ContainerEngine::Docker => {
                let args: Vec<String> = ["run", "--rm", "--gpus", "all"]
                    .into_iter()
                    .map(String::from)
                    .chain([self.options.gpu_probe_image.clone(), "true".to_string()])
                    .collect();
                self.runner.succeeds(&self.program, &args).await
            }
        };

        if !available {
            tracing::warn!("GPU requested but `{} run --gpus all` failed", self.engine);
        }
        available
    }
}
