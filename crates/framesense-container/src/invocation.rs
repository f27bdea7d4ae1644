//! Engine-specific argument vectors.
//!
//! Docker runs a fresh container per call. Singularity executes one-shot calls
//! with `exec` and keeps services in a named instance that later `exec` calls
//! attach to.

use std::path::PathBuf;

use crate::binding::Binding;
use crate::engine::ContainerEngine;

/// Working directory of operator code inside every container.
pub const APP_DIR: &str = "/app";

/// A `host:container` TCP port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    pub fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }
}

/// Everything needed to start one container.
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    /// Docker image reference or Singularity `.sif` path.
    pub image: String,
    /// Command and arguments, already translated to container paths.
    pub command: Vec<String>,
    pub bindings: Vec<Binding>,
    /// Run as the invoking uid:gid (Docker only).
    pub same_user: bool,
    /// Use the host network (Docker only; Singularity always shares it).
    pub share_network: bool,
    pub ports: Option<PortMapping>,
    pub gpu: bool,
}

impl RunSpec {
    pub fn new(image: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            image: image.into(),
            command,
            ..Default::default()
        }
    }

    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn ports(mut self, ports: PortMapping) -> Self {
        self.ports = Some(ports);
        self
    }

    pub fn gpu(mut self, gpu: bool) -> Self {
        self.gpu = gpu;
        self
    }

    pub fn same_user(mut self, same_user: bool) -> Self {
        self.same_user = same_user;
        self
    }

    pub fn share_network(mut self, share_network: bool) -> Self {
        self.share_network = share_network;
        self
    }
}

/// Argument vectors that start a long-lived service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceInvocation {
    /// One foreground process that is the service.
    Single(Vec<String>),
    /// Start a named instance, then run the service command inside it.
    Instance { start: Vec<String>, exec: Vec<String> },
}

impl ContainerEngine {
    /// Arguments for a one-shot call.
    pub fn run_args(&self, spec: &RunSpec) -> Vec<String> {
        match self {
            ContainerEngine::Docker => docker_run(spec, None),
            ContainerEngine::Singularity => {
                let mut args = vec!["exec".to_string()];
                push_mounts(&mut args, "-B", &spec.bindings);
                push_all(&mut args, ["--pwd", APP_DIR]);
                if spec.gpu {
                    args.push("--nv".to_string());
                }
                args.push(spec.image.clone());
                args.extend(spec.command.iter().cloned());
                args
            }
        }
    }

    /// Arguments that start `spec` as the service called `name`.
    pub fn service_args(&self, spec: &RunSpec, name: &str) -> ServiceInvocation {
        match self {
            ContainerEngine::Docker => ServiceInvocation::Single(docker_run(spec, Some(name))),
            ContainerEngine::Singularity => {
                let mut start = vec!["instance".to_string(), "start".to_string()];
                push_mounts(&mut start, "-B", &spec.bindings);
                if spec.gpu {
                    start.push("--nv".to_string());
                }
                start.push(spec.image.clone());
                start.push(name.to_string());

                let mut exec = vec!["exec".to_string()];
                push_all(&mut exec, ["--pwd", APP_DIR]);
                exec.push(format!("instance://{name}"));
                exec.extend(spec.command.iter().cloned());

                ServiceInvocation::Instance { start, exec }
            }
        }
    }

    /// Arguments that stop the service called `name`.
    pub fn stop_args(&self, name: &str) -> Vec<String> {
        match self {
            ContainerEngine::Docker => vec!["stop".to_string(), name.to_string()],
            ContainerEngine::Singularity => {
                vec!["instance".to_string(), "stop".to_string(), name.to_string()]
            }
        }
    }

    /// Arguments that list running services; the output contains `name` when
    /// it is running.
    pub fn list_args(&self, name: &str) -> Vec<String> {
        match self {
            ContainerEngine::Docker => vec![
                "ps".to_string(),
                "--filter".to_string(),
                format!("name={name}"),
                "--format".to_string(),
                "{{.Names}}".to_string(),
            ],
            ContainerEngine::Singularity => vec!["instance".to_string(), "list".to_string()],
        }
    }
}

fn docker_run(spec: &RunSpec, name: Option<&str>) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];
    if spec.same_user {
        if let Some(user) = current_user() {
            push_all(&mut args, ["--user", user.as_str()]);
        }
    }
    push_mounts(&mut args, "-v", &spec.bindings);
    if let Some(ports) = spec.ports {
        args.push("-p".to_string());
        args.push(format!("{}:{}", ports.host, ports.container));
    }
    if spec.gpu {
        push_all(&mut args, ["--gpus", "all"]);
    }
    if spec.share_network {
        push_all(&mut args, ["--network", "host"]);
    }
    if let Some(name) = name {
        push_all(&mut args, ["--name", name]);
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

fn push_mounts(args: &mut Vec<String>, flag: &str, bindings: &[Binding]) {
    for binding in bindings {
        args.push(flag.to_string());
        args.push(binding.mount_spec());
    }
}

fn push_all<'a>(args: &mut Vec<String>, items: impl IntoIterator<Item = &'a str>) {
    args.extend(items.into_iter().map(String::from));
}

#[cfg(unix)]
fn current_user() -> Option<String> {
    use nix::unistd::{getgid, getuid};
    Some(format!("{}:{}", getuid(), getgid()))
}

#[cfg(not(unix))]
fn current_user() -> Option<String> {
    None
}

/// Singularity image path for `operator` under `cache_dir`.
pub fn sif_path(cache_dir: &std::path::Path, operator: &str) -> PathBuf {
    cache_dir.join(format!("{operator}.sif"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RunSpec {
        RunSpec::new("framesense/embed", vec!["python".into(), "serve.py".into()])
            .binding(Binding::new("/ops/embed/app", APP_DIR))
            .binding(Binding::new("/media/col1", "/data"))
    }

    #[test]
    fn test_docker_one_shot() {
        let args = ContainerEngine::Docker.run_args(&spec().gpu(true).share_network(true));
        assert_eq!(
            args,
            [
                "run", "--rm", "-v", "/ops/embed/app:/app", "-v", "/media/col1:/data",
                "--gpus", "all", "--network", "host", "framesense/embed", "python", "serve.py"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_docker_same_user() {
        let args = ContainerEngine::Docker.run_args(&spec().same_user(true));
        assert_eq!(args[2], "--user");
        assert!(args[3].contains(':'));
    }

    #[test]
    fn test_docker_service() {
        let spec = spec().ports(PortMapping::new(5000, 5000));
        let ServiceInvocation::Single(args) =
            ContainerEngine::Docker.service_args(&spec, "framesense_embed_service")
        else {
            panic!("docker services are a single process");
        };
        assert_eq!(
            args,
            [
                "run", "--rm", "-v", "/ops/embed/app:/app", "-v", "/media/col1:/data",
                "-p", "5000:5000", "--name", "framesense_embed_service",
                "framesense/embed", "python", "serve.py"
            ]
        );
    }

    #[test]
    fn test_singularity_one_shot() {
        let mut spec = spec().gpu(true).same_user(true).share_network(true);
        spec.image = "/cache/embed.sif".to_string();
        let args = ContainerEngine::Singularity.run_args(&spec);
        assert_eq!(
            args,
            [
                "exec", "-B", "/ops/embed/app:/app", "-B", "/media/col1:/data",
                "--pwd", "/app", "--nv", "/cache/embed.sif", "python", "serve.py"
            ]
        );
    }

    #[test]
    fn test_singularity_service_is_two_steps() {
        let mut spec = spec();
        spec.image = "/cache/embed.sif".to_string();
        let invocation = ContainerEngine::Singularity.service_args(&spec, "svc");
        assert_eq!(
            invocation,
            ServiceInvocation::Instance {
                start: ["instance", "start", "-B", "/ops/embed/app:/app", "-B",
                        "/media/col1:/data", "/cache/embed.sif", "svc"]
                    .map(String::from)
                    .to_vec(),
                exec: ["exec", "--pwd", "/app", "instance://svc", "python", "serve.py"]
                    .map(String::from)
                    .to_vec(),
            }
        );
    }

    #[test]
    fn test_stop_and_list() {
        assert_eq!(ContainerEngine::Docker.stop_args("svc"), ["stop", "svc"]);
        assert_eq!(
            ContainerEngine::Singularity.stop_args("svc"),
            ["instance", "stop", "svc"]
        );
        assert_eq!(
            ContainerEngine::Docker.list_args("svc"),
            ["ps", "--filter", "name=svc", "--format", "{{.Names}}"]
        );
        assert_eq!(ContainerEngine::Singularity.list_args("svc"), ["instance", "list"]);
    }
}
