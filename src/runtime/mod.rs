//! Operator runtime: argument checks, collections, containers, and cleanup
//! around one operator run.

pub mod context;
pub mod operator;
pub mod params;
pub mod registry;

pub use context::{CommandArgs, ContainerTools, OperatorContext, OperatorInfo, RunContext, RunOptions};
pub use operator::{ArgumentKind, Operator};
pub use params::OperatorParams;
pub use registry::{OperatorFactory, OperatorRegistry};

use std::path::Path;
use std::sync::Arc;

use framesense_common::{CollectionsManifest, Error as RecordError};
use framesense_container::EngineRegistry;

use crate::config::Config;
use crate::error::{Error, Result};

/// Reject every supplied flag the operator does not declare, all at once.
pub fn check_arguments(name: &str, supported: &[ArgumentKind], args: &CommandArgs) -> Result<()> {
    let flags: Vec<String> = args
        .supplied()
        .into_iter()
        .filter(|kind| !supported.contains(kind))
        .map(|kind| kind.flag().to_string())
        .collect();

    if flags.is_empty() {
        Ok(())
    } else {
        Err(Error::UnsupportedArguments {
            operator: name.to_string(),
            flags,
        })
    }
}

/// Runs operators from a registry.
#[derive(Debug)]
pub struct OperatorRuntime {
    registry: OperatorRegistry,
    config: Arc<Config>,
    debug: bool,
    engine: Option<Arc<EngineRegistry>>,
}

impl OperatorRuntime {
    pub fn new(registry: OperatorRegistry, config: Config, debug: bool) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            debug,
            engine: None,
        }
    }

    /// Use `engine` instead of probing for one.
    pub fn with_engine(mut self, engine: Arc<EngineRegistry>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run operator `name` once.
    ///
    /// Configuration problems (unknown operator, unsupported flags, missing
    /// manifest) are reported before any container work. Once containers are
    /// involved the operator's service is stopped on every exit path.
    pub async fn run(&self, name: &str, manifest: Option<&Path>, args: CommandArgs) -> Result<()> {
        let mut operator = self.registry.create(name)?;
        check_arguments(name, operator.supported_arguments(), &args)?;

        let (collections_path, collections) = if operator.needs_collections() {
            let path = manifest.ok_or_else(|| {
                Error::config(format!(
                    "operator {name} needs a collections manifest (use --collections or {})",
                    crate::config::COLLECTIONS_ENV
                ))
            })?;
            let (path, manifest) = CollectionsManifest::load(path).map_err(|e| match e {
                RecordError::NotFound(path) => Error::config(format!(
                    "collections manifest not found: {}",
                    path.display()
                )),
                other => other.into(),
            })?;
            (Some(path), manifest.data)
        } else {
            (None, Vec::new())
        };

        let operator_dir = self.config.operators.dir.join(name);
        let params = OperatorParams::load(&operator_dir, self.config.operators.params.get(name))?;
        let run = RunContext {
            collections,
            collections_path,
            command_args: args,
            debug: self.debug,
            catalog: self.registry.list(),
        };
        let mut ctx = OperatorContext::new(name, run, params, operator_dir);

        if operator.uses_containers() {
            let engine = match &self.engine {
                Some(engine) => engine.clone(),
                None => Arc::new(EngineRegistry::detect(
                    self.config.engine.engine.as_deref(),
                    self.config.engine.engine_options(self.debug),
                )
                .await?),
            };
            tracing::debug!("Using {} ({})", engine.engine(), engine.program().display());
            ctx.attach_containers(ContainerTools::new(engine, &self.config, name));
        }

        let result = drive(operator.as_mut(), &mut ctx).await;
        let cleanup = ctx.after_apply().await;
        match (result, cleanup) {
            (Err(e), Err(cleanup)) => {
                tracing::warn!("Cleanup after {name} failed: {cleanup}");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), cleanup) => cleanup,
        }
    }
}

async fn drive(operator: &mut dyn Operator, ctx: &mut OperatorContext) -> Result<()> {
    ctx.before_apply().await?;
    let name = ctx.name().to_string();
    tokio::select! {
        result = operator.apply(ctx) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping {name}");
            Err(Error::Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_check_arguments_reports_all_flags() {
        let args = CommandArgs {
            filter: Some("x".to_string()),
            redo: true,
            dry_run: true,
            ..Default::default()
        };
        let err = check_arguments("make_frames_ffmpeg", &[ArgumentKind::Filter], &args).unwrap_err();
        assert_matches!(err, Error::UnsupportedArguments { ref flags, .. } if flags == &["--redo", "--dry-run"]);

        assert!(check_arguments("collections", &[], &CommandArgs::default()).is_ok());
    }

    #[tokio::test]
    async fn test_missing_manifest_is_config_error() {
        let runtime = OperatorRuntime::new(OperatorRegistry::builtin(), Config::default(), false);
        let err = runtime
            .run("collections", None, CommandArgs::default())
            .await
            .unwrap_err();
        assert_matches!(err, Error::Config(_));

        let err = runtime
            .run("collections", Some(Path::new("/nonexistent/collections.json")), CommandArgs::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
