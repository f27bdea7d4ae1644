//! Shared fixtures for integration tests.
//!
//! [`Collection`] lays out a small media collection with its manifest.
//! [`FakeDocker`] is a shell script standing in for the docker binary: it
//! logs every invocation to `calls.log`, answers `ffprobe` with a fixed
//! duration and one-shot processor runs with a fixed answer, and keeps named (service) containers alive until stopped.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use framesense::config::Config;
use framesense_container::{ContainerEngine, EngineOptions, EngineRegistry};
use tempfile::{tempdir, TempDir};

/// A collection `col1` with one video, one clip, and one shot holding two
/// frames.
pub struct Collection {
    pub dir: TempDir,
    pub manifest: PathBuf,
    pub root: PathBuf,
    pub shot_dir: PathBuf,
}

impl Collection {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().join("media");
        let clip_dir = root.join("video-1").join("00.00.10-5");
        let shot_dir = clip_dir.join("shots").join("001");
        fs::create_dir_all(&shot_dir).unwrap();
        fs::create_dir_all(root.join("video-2")).unwrap();
        fs::write(root.join("video-1").join("video-1.mp4"), b"").unwrap();
        fs::write(clip_dir.join("00.00.10-5.mp4"), b"").unwrap();
        fs::write(shot_dir.join("shot.mp4"), b"").unwrap();

        let manifest = dir.path().join("collections.json");
        fs::write(
            &manifest,
            r#"{"data": [{"id": "col1", "attributes": {"path": "media"}}]}"#,
        )
        .unwrap();

        let root = root.canonicalize().unwrap();
        let shot_dir = root.join("video-1/00.00.10-5/shots/001");
        Self {
            dir,
            manifest,
            root,
            shot_dir,
        }
    }

    /// Add frame images to the shot folder.
    pub fn with_frames(self, names: &[&str]) -> Self {
        for name in names {
            fs::write(self.shot_dir.join(name), b"").unwrap();
        }
        self
    }

    /// Configuration with operator directories under the fixture.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.operators.dir = self.dir.path().join("operators");
        config.service.ready_grace_ms = 50;
        config.service.startup_timeout_secs = 10;
        config
    }

    pub fn frames_file(&self) -> PathBuf {
        self.shot_dir.join("frames.json")
    }
}

pub struct FakeDocker {
    dir: TempDir,
    program: PathBuf,
}

impl FakeDocker {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        let script = format!(
            r#"#!/bin/sh
STATE="{state}"
echo "$*" >> "$STATE/calls.log"
case "$1" in
  ps)
    [ -f "$STATE/running" ] && cat "$STATE/running"
    exit 0 ;;
  stop)
    rm -f "$STATE/running"
    exit 0 ;;
  image)
    exit 1 ;;
  run)
    name=""
    prev=""
    for a in "$@"; do
      [ "$prev" = "--name" ] && name="$a"
      prev="$a"
    done
    if [ -n "$name" ]; then
      echo "$name" > "$STATE/running"
      echo " * Running on http://127.0.0.1:5000" >&2
      exec sleep 30
    fi
    case "$*" in
      *ffprobe*) echo '{{"format": {{"duration": "2.000000"}}}}' ;;
      *processor.py*) echo '{{"error": "", "result": "a red car"}}' ;;
    esac
    exit 0 ;;
esac
exit 0
"#,
            state = dir.path().display(),
        );
        let program = dir.path().join("docker");
        fs::write(&program, script).unwrap();
        make_executable(&program);
        Self { dir, program }
    }

    pub fn registry(&self) -> Arc<EngineRegistry> {
        Arc::new(EngineRegistry::with_binary(
            ContainerEngine::Docker,
            &self.program,
            EngineOptions::default(),
        ))
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Calls whose arguments start with `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.dir.path().join("running").exists()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
