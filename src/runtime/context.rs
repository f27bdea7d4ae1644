//! Execution context handed to an operator's `apply`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use framesense_common::{paths, CacheStats, Collection};
use framesense_container::binding::translate_path;
use framesense_container::{
    translate, Arg, Binding, CommandOutput, EngineRegistry, ImageBuilder, PortMapping, RunSpec,
    ServiceClient, ServiceManager, ServiceResponse, ServiceState, APP_DIR,
};

use super::operator::ArgumentKind;
use super::params::{OperatorParams, APP_SUBDIR};
use crate::config::Config;
use crate::error::{Error, Result};

/// Container directory the collection root is mounted at.
pub const DATA_DIR: &str = "/data";

/// Entry point of the companion code inside the container.
pub const PROCESSOR: &str = "/app/processor.py";

const SERVICE_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Flags given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    pub filter: Option<String>,
    pub verbose: bool,
    pub redo: bool,
    pub dry_run: bool,
    pub parameters: Option<String>,
}

impl CommandArgs {
    /// Every flag that was actually supplied.
    pub fn supplied(&self) -> Vec<ArgumentKind> {
        let mut supplied = Vec::new();
        if self.filter.is_some() {
            supplied.push(ArgumentKind::Filter);
        }
        if self.verbose {
            supplied.push(ArgumentKind::Verbose);
        }
        if self.redo {
            supplied.push(ArgumentKind::Redo);
        }
        if self.dry_run {
            supplied.push(ArgumentKind::DryRun);
        }
        if self.parameters.is_some() {
            supplied.push(ArgumentKind::Parameters);
        }
        supplied
    }

    /// Whether `path` passes `--filter`.
    pub fn is_selected(&self, path: &Path) -> bool {
        paths::is_selected(path, self.filter.as_deref())
    }
}

/// Name and one-line description of a registered operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// What the process knows before any operator runs.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub collections: Vec<Collection>,
    pub collections_path: Option<PathBuf>,
    pub command_args: CommandArgs,
    pub debug: bool,
    /// Every registered operator, for listing.
    pub catalog: Vec<OperatorInfo>,
}

/// Options of a one-shot container call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run as the invoking uid:gid so outputs are owned by the user.
    pub same_user: bool,
    /// Share the host network, e.g. to reach a local Ollama.
    pub share_network: bool,
}

/// Engine handles of an operator that runs containers.
#[derive(Debug)]
pub struct ContainerTools {
    engine: Arc<EngineRegistry>,
    images: ImageBuilder,
    service: ServiceManager,
    client: ServiceClient,
    ports: PortMapping,
    image: String,
}

impl ContainerTools {
    pub fn new(engine: Arc<EngineRegistry>, config: &Config, operator: &str) -> Self {
        let images = ImageBuilder::new(engine.clone(), config.engine.image_options());
        let service = ServiceManager::new(engine.clone(), operator, config.service.service_options());
        let image = images.image_ref(operator);
        Self {
            engine,
            images,
            service,
            client: ServiceClient::localhost(config.service.host_port),
            ports: PortMapping::new(config.service.host_port, config.service.container_port),
            image,
        }
    }

    pub fn engine(&self) -> &EngineRegistry {
        &self.engine
    }

    pub fn service(&self) -> &ServiceManager {
        &self.service
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

/// Per-run state of one operator.
#[derive(Debug)]
pub struct OperatorContext {
    pub run: RunContext,
    pub params: OperatorParams,
    name: String,
    operator_dir: PathBuf,
    containers: Option<ContainerTools>,
}

impl OperatorContext {
    pub fn new(
        name: impl Into<String>,
        run: RunContext,
        params: OperatorParams,
        operator_dir: PathBuf,
    ) -> Self {
        Self {
            run,
            params,
            name: name.into(),
            operator_dir,
            containers: None,
        }
    }

    pub fn attach_containers(&mut self, tools: ContainerTools) {
        self.containers = Some(tools);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collections(&self) -> &[Collection] {
        &self.run.collections
    }

    pub fn args(&self) -> &CommandArgs {
        &self.run.command_args
    }

    pub fn operator_dir(&self) -> &Path {
        &self.operator_dir
    }

    pub fn containers(&self) -> Option<&ContainerTools> {
        self.containers.as_ref()
    }

    /// The operator's companion code mounted at `/app`.
    pub fn app_binding(&self) -> Binding {
        Binding::new(self.operator_dir.join(APP_SUBDIR), APP_DIR)
    }

    /// Log the reuse counters of a cache-driven run.
    pub fn report(&self, stats: CacheStats) {
        tracing::info!(
            "{}: {} reused, {} computed",
            self.name,
            stats.reused,
            stats.computed
        );
    }

    /// Stop a service left over from an earlier run and bring the image up
    /// to date.
    pub async fn before_apply(&mut self) -> Result<()> {
        let Some(tools) = self.containers.as_mut() else {
            return Ok(());
        };
        tools.service.stop().await?;
        tools.image = tools.images.ensure_image(&self.name, &self.operator_dir).await?;
        Ok(())
    }

    /// Stop the service. Runs whether `apply` succeeded or not.
    pub async fn after_apply(&mut self) -> Result<()> {
        let Some(tools) = self.containers.as_mut() else {
            return Ok(());
        };
        if tools.service.state() == ServiceState::Ready {
            match tokio::time::timeout(SERVICE_STOP_TIMEOUT, tools.client.stop()).await {
                Ok(Err(e)) => tracing::debug!("Service stop request failed: {e}"),
                Err(_) => tracing::debug!("Service stop request timed out"),
                Ok(Ok(())) => {}
            }
        }
        tools.service.stop().await?;
        Ok(())
    }

    /// Run a one-shot container with the companion code at `/app` and
    /// `binding` mounted; path arguments are translated to container paths.
    pub async fn run_in_container(
        &mut self,
        args: &[Arg],
        binding: Binding,
        options: RunOptions,
    ) -> Result<CommandOutput> {
        let app = self.app_binding();
        let tools = tools_mut(&mut self.containers, &self.name)?;
        self.params.write()?;

        let bindings = vec![app, binding];
        let spec = RunSpec {
            image: tools.image.clone(),
            command: translate(&bindings, args),
            bindings,
            same_user: options.same_user,
            share_network: options.share_network,
            ports: None,
            gpu: tools.engine.gpu_available().await,
        };
        let engine_args = tools.engine.engine().run_args(&spec);
        Ok(tools.engine.run(&engine_args).await?)
    }

    /// Run the companion processor once on `input` and parse the JSON it
    /// prints.
    pub async fn run_processor(
        &mut self,
        input: &Path,
        data_root: &Path,
        options: RunOptions,
    ) -> Result<ServiceResponse> {
        let args = [Arg::from("python"), Arg::from(PROCESSOR), Arg::from(input)];
        let output = self
            .run_in_container(&args, Binding::new(data_root, DATA_DIR), options)
            .await?;

        let response = parse_processor_output(&output.stdout).ok_or_else(|| {
            Error::operator(format!("no JSON answer from processor for {}", input.display()))
        })?;
        check_response(input, response)
    }

    /// Process `input` with the operator's service, starting or rebinding it
    /// to `collection_root` when needed.
    pub async fn call_service(
        &mut self,
        input: &Path,
        collection_root: &Path,
    ) -> Result<ServiceResponse> {
        let bindings = vec![self.app_binding(), Binding::new(collection_root, DATA_DIR)];
        let container_input = translate_path(&bindings, input).ok_or_else(|| {
            Error::operator(format!(
                "{} is not inside collection {}",
                input.display(),
                collection_root.display()
            ))
        })?;

        let tools = tools_mut(&mut self.containers, &self.name)?;
        self.params.write()?;
        let spec = RunSpec {
            image: tools.image.clone(),
            command: vec!["python".into(), PROCESSOR.into(), "serve".into()],
            bindings,
            ports: Some(tools.ports),
            gpu: tools.engine.gpu_available().await,
            ..Default::default()
        };
        tools.service.ensure_bound(collection_root, &spec).await?;

        let response = tools
            .client
            .process(&container_input.to_string_lossy())
            .await
            .map_err(|e| match e {
                framesense_container::Error::ServiceCall { message, .. } => {
                    framesense_container::Error::service_call(input, message)
                }
                other => other,
            })?;
        Ok(response)
    }
}

fn tools_mut<'a>(
    containers: &'a mut Option<ContainerTools>,
    name: &str,
) -> Result<&'a mut ContainerTools> {
    containers
        .as_mut()
        .ok_or_else(|| Error::config(format!("operator {name} does not use containers")))
}

/// The last stdout line that parses as a processor response.
pub fn parse_processor_output(stdout: &str) -> Option<ServiceResponse> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| serde_json::from_str(l).ok())
        .or_else(|| serde_json::from_str(stdout.trim()).ok())
}

fn check_response(input: &Path, response: ServiceResponse) -> Result<ServiceResponse> {
    match response.error.as_deref().map(str::trim) {
        Some(message) if !message.is_empty() => {
            Err(framesense_container::Error::service_call(input, message).into())
        }
        _ => Ok(response),
    }
}
