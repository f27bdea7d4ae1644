use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use framesense_container::{EngineOptions, ImageOptions, ServiceOptions};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub operators: OperatorsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Force `docker` or `singularity` instead of probing.
    #[serde(default)]
    pub engine: Option<String>,

    /// Docker images are tagged `<image_namespace>/<operator>`.
    #[serde(default = "default_image_namespace")]
    pub image_namespace: String,

    /// Where Singularity `.sif` and `.def` files are kept.
    #[serde(default = "default_image_cache_dir")]
    pub image_cache_dir: PathBuf,

    #[serde(default = "default_gpu_env_var")]
    pub gpu_env_var: String,

    #[serde(default = "default_gpu_probe_image")]
    pub gpu_probe_image: String,

    /// Dockerfile to Singularity definition converter.
    #[serde(default = "default_definition_converter")]
    pub definition_converter: String,
}

fn default_image_namespace() -> String {
    "framesense".to_string()
}

fn default_image_cache_dir() -> PathBuf {
    PathBuf::from("~/.cache/framesense/images")
}

fn default_gpu_env_var() -> String {
    "CUDA_VISIBLE_DEVICES".to_string()
}

fn default_gpu_probe_image() -> String {
    "ubuntu".to_string()
}

fn default_definition_converter() -> String {
    "spython".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: None,
            image_namespace: default_image_namespace(),
            image_cache_dir: default_image_cache_dir(),
            gpu_env_var: default_gpu_env_var(),
            gpu_probe_image: default_gpu_probe_image(),
            definition_converter: default_definition_converter(),
        }
    }
}

impl EngineConfig {
    pub fn engine_options(&self, debug: bool) -> EngineOptions {
        EngineOptions {
            gpu_env_var: self.gpu_env_var.clone(),
            gpu_probe_image: self.gpu_probe_image.clone(),
            debug,
        }
    }

    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            namespace: self.image_namespace.clone(),
            cache_dir: self.image_cache_dir.clone(),
            converter: self.definition_converter.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_port")]
    pub host_port: u16,

    #[serde(default = "default_port")]
    pub container_port: u16,

    /// Output substring announcing that the service accepts requests.
    #[serde(default = "default_ready_marker")]
    pub ready_marker: String,

    #[serde(default = "default_ready_grace_ms")]
    pub ready_grace_ms: u64,

    /// Model downloads can take a long time on first start.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_port() -> u16 {
    5000
}

fn default_ready_marker() -> String {
    "Running on".to_string()
}

fn default_ready_grace_ms() -> u64 {
    1000
}

fn default_startup_timeout_secs() -> u64 {
    1800
}

fn default_name_prefix() -> String {
    "framesense".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host_port: default_port(),
            container_port: default_port(),
            ready_marker: default_ready_marker(),
            ready_grace_ms: default_ready_grace_ms(),
            startup_timeout_secs: default_startup_timeout_secs(),
            name_prefix: default_name_prefix(),
        }
    }
}

impl ServiceConfig {
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            name_prefix: self.name_prefix.clone(),
            ready_marker: self.ready_marker.clone(),
            ready_grace: Duration::from_millis(self.ready_grace_ms),
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperatorsConfig {
    /// Root of the per-operator companion directories.
    #[serde(default = "default_operators_dir")]
    pub dir: PathBuf,

    /// Parameter overrides keyed by operator name.
    #[serde(default)]
    pub params: BTreeMap<String, Map<String, Value>>,
}

fn default_operators_dir() -> PathBuf {
    PathBuf::from("./operators")
}

impl Default for OperatorsConfig {
    fn default() -> Self {
        Self {
            dir: default_operators_dir(),
            params: BTreeMap::new(),
        }
    }
}
