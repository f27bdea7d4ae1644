//! Build-on-demand operator images.
//!
//! An operator that ships a `Dockerfile` gets its image rebuilt whenever the
//! image is missing or older than the Dockerfile. Singularity images are
//! produced by converting the Dockerfile to a definition file first.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{ContainerEngine, EngineRegistry};
use crate::invocation::sif_path;
use crate::{Error, Result};

/// Build declaration file looked up in each operator directory.
pub const BUILD_FILE: &str = "Dockerfile";

/// Where and how images are named and stored.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Docker images are tagged `<namespace>/<operator>`.
    pub namespace: String,
    /// Directory holding `<operator>.sif` and `<operator>.def`.
    pub cache_dir: PathBuf,
    /// Dockerfile to Singularity definition converter (`spython`).
    pub converter: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            namespace: "framesense".to_string(),
            cache_dir: PathBuf::from(".cache/framesense/images"),
            converter: "spython".to_string(),
        }
    }
}

/// Builds operator images through the detected engine.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    registry: Arc<EngineRegistry>,
    options: ImageOptions,
}

impl ImageBuilder {
    pub fn new(registry: Arc<EngineRegistry>, options: ImageOptions) -> Self {
        Self { registry, options }
    }

    /// The reference containers of `operator` are started from.
    pub fn image_ref(&self, operator: &str) -> String {
        match self.registry.engine() {
            ContainerEngine::Docker => format!("{}/{}", self.options.namespace, operator),
            ContainerEngine::Singularity => sif_path(&self.options.cache_dir, operator)
                .to_string_lossy()
                .into_owned(),
        }
    }

    /// Make sure the image for `operator` is current and return its reference.
    ///
    /// Without a [`BUILD_FILE`] in `operator_dir` nothing is built.
    pub async fn ensure_image(&self, operator: &str, operator_dir: &Path) -> Result<String> {
        let image = self.image_ref(operator);
        let build_file = operator_dir.join(BUILD_FILE);
        if !build_file.is_file() {
            tracing::debug!("{operator}: no {BUILD_FILE}, using {image} as is");
            return Ok(image);
        }

        let declared = modified_at(&build_file)?;
        let built = match self.registry.engine() {
            ContainerEngine::Docker => self.docker_created(&image).await,
            ContainerEngine::Singularity => modified_at(Path::new(&image)).ok(),
        };

        if !is_stale(built, declared) {
            tracing::debug!("{operator}: image {image} is up to date");
            return Ok(image);
        }

        tracing::info!("Building image {image}");
        match self.registry.engine() {
            ContainerEngine::Docker => self.docker_build(&image, operator_dir).await?,
            ContainerEngine::Singularity => {
                self.singularity_build(operator, operator_dir, &build_file)
                    .await?
            }
        }
        Ok(image)
    }

    async fn docker_created(&self, image: &str) -> Option<DateTime<Utc>> {
        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            "-f".to_string(),
            "{{.Created}}".to_string(),
            image.to_string(),
        ];
        let output = self.registry.runner().output(self.registry.program(), &args).await.ok()?;
        if !output.status.success() {
            return None;
        }
        DateTime::parse_from_rfc3339(output.stdout.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    async fn docker_build(&self, image: &str, operator_dir: &Path) -> Result<()> {
        let args = vec![
            "build".to_string(),
            "-t".to_string(),
            image.to_string(),
            operator_dir.to_string_lossy().into_owned(),
        ];
        self.registry.run(&args).await?;
        Ok(())
    }

    async fn singularity_build(
        &self,
        operator: &str,
        operator_dir: &Path,
        build_file: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.options.cache_dir)?;
        let operator_dir = std::path::absolute(operator_dir)?;

        let converter = which::which(&self.options.converter)
            .unwrap_or_else(|_| PathBuf::from(&self.options.converter));
        let recipe = self
            .registry
            .runner()
            .run(
                &converter,
                &["recipe".to_string(), build_file.to_string_lossy().into_owned()],
            )
            .await?;
        if recipe.stdout.trim().is_empty() {
            return Err(Error::image_build(
                operator,
                format!("{} produced an empty definition", self.options.converter),
            ));
        }

        let definition = absolutize_files_section(&recipe.stdout, &operator_dir);
        let def_path = self.options.cache_dir.join(format!("{operator}.def"));
        std::fs::write(&def_path, definition)?;

        let sif = sif_path(&self.options.cache_dir, operator);
        if sif.exists() {
            std::fs::remove_file(&sif)?;
        }

        let remote = self
            .registry
            .runner()
            .succeeds(
                self.registry.program(),
                &["remote".to_string(), "status".to_string()],
            )
            .await;

        let args = vec![
            "build".to_string(),
            if remote { "--remote" } else { "--fakeroot" }.to_string(),
            sif.to_string_lossy().into_owned(),
            def_path.to_string_lossy().into_owned(),
        ];
        self.registry.run(&args).await?;
        Ok(())
    }
}

/// An image needs a rebuild when it is missing or older than its declaration.
pub fn is_stale(built: Option<DateTime<Utc>>, declared: DateTime<Utc>) -> bool {
    built.is_none_or(|built| built < declared)
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
    Ok(std::fs::metadata(path)?.modified()?.into())
}

/// Rewrite relative sources in the `%files` section of a Singularity
/// definition to absolute paths under `base`.
pub fn absolutize_files_section(definition: &str, base: &Path) -> String {
    let mut in_files = false;
    let mut out = String::with_capacity(definition.len());

    for line in definition.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('%') {
            in_files = trimmed.split_whitespace().next() == Some("%files");
            out.push_str(line);
        } else if in_files && !trimmed.is_empty() && !trimmed.starts_with('#') {
            let indent = &line[..line.len() - trimmed.len()];
            let mut parts = trimmed.splitn(2, char::is_whitespace);
            let source = parts.next().unwrap_or_default();
            let rest = parts.next().unwrap_or_default();

            let source = Path::new(source);
            let source = if source.is_absolute() {
                source.to_path_buf()
            } else {
                base.join(source)
            };

            out.push_str(indent);
            out.push_str(&source.to_string_lossy());
            if !rest.is_empty() {
                out.push(' ');
                out.push_str(rest.trim_start());
            }
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        assert!(is_stale(None, now));
        assert!(is_stale(Some(now - Duration::hours(1)), now));
        assert!(!is_stale(Some(now + Duration::hours(1)), now));
    }

    #[test]
    fn test_absolutize_files_section() {
        let def = "\
Bootstrap: docker
From: python:3.11

%files
    app /app
    /etc/hosts /etc/hosts
    # comment
%post
    pip install -r requirements.txt
";
        let out = absolutize_files_section(def, Path::new("/ops/embed"));
        assert!(out.contains("    /ops/embed/app /app\n"));
        assert!(out.contains("    /etc/hosts /etc/hosts\n"));
        assert!(out.contains("    # comment\n"));
        assert!(out.contains("    pip install -r requirements.txt\n"));
    }

    #[test]
    fn test_image_ref_per_engine() {
        let options = ImageOptions {
            namespace: "acme".to_string(),
            cache_dir: PathBuf::from("/cache"),
            converter: "spython".to_string(),
        };
        let docker = ImageBuilder::new(
            Arc::new(EngineRegistry::with_binary(
                ContainerEngine::Docker,
                "docker",
                EngineOptions::default(),
            )),
            options.clone(),
        );
        assert_eq!(docker.image_ref("embed"), "acme/embed");

        let singularity = ImageBuilder::new(
            Arc::new(EngineRegistry::with_binary(
                ContainerEngine::Singularity,
                "singularity",
                EngineOptions::default(),
            )),
            options,
        );
        assert_eq!(singularity.image_ref("embed"), "/cache/embed.sif");
    }

    #[tokio::test]
    async fn test_no_build_file_is_a_no_op() {
        let dir = tempdir().unwrap();
        let builder = ImageBuilder::new(
            Arc::new(EngineRegistry::with_binary(
                ContainerEngine::Docker,
                "nonexistent_engine_12345",
                EngineOptions::default(),
            )),
            ImageOptions::default(),
        );
        let image = builder.ensure_image("embed", dir.path()).await.unwrap();
        assert_eq!(image, "framesense/embed");
    }
}
