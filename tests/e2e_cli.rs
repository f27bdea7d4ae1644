//! CLI end-to-end tests
//!
//! Tests for the framesense command-line interface. None of these reach a
//! container engine.

mod common;

use assert_cmd::prelude::*;
use common::Collection;
use predicates::prelude::*;
use std::process::Command;

/// Get a command for the framesense binary
#[allow(deprecated)]
fn framesense_cmd() -> Command {
    let mut cmd = Command::cargo_bin("framesense").unwrap();
    cmd.env_remove("FRAMESENSE_COLLECTIONS")
        .env_remove("FRAMESENSE_CONTAINER_ENGINE")
        .env_remove("FRAMESENSE_DEBUG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_usage() {
    framesense_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_lists_operators() {
    framesense_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("Operators:"))
        .stdout(predicate::str::contains("make_frames_ffmpeg"))
        .stdout(predicate::str::contains("Extract frames from shots using ffmpeg"));
}

#[test]
fn test_cli_version_flag() {
    framesense_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("framesense"));
}

#[test]
fn test_cli_operators_needs_no_manifest() {
    framesense_cmd()
        .arg("operators")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "embed_frames_transformers: Generate a vector from a frame using an embedding model",
        ))
        .stdout(predicate::str::contains("scale_frames_sssabet: "))
        .stdout(predicate::str::ends_with("done (operators)\n"));
}

#[test]
fn test_cli_unknown_operator() {
    framesense_cmd()
        .arg("frobnicate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ERROR: unknown operator 'frobnicate'"))
        .stdout(predicate::str::contains("done").not());
}

#[test]
fn test_cli_missing_manifest() {
    framesense_cmd()
        .arg("collections")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ERROR: operator collections needs a collections manifest"));

    framesense_cmd()
        .args(["collections", "--collections", "/nonexistent/collections.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("collections manifest not found"));
}

#[test]
fn test_cli_collections_listing() {
    let collection = Collection::new();
    framesense_cmd()
        .arg("collections")
        .arg("--collections")
        .arg(&collection.manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("col1 has 2 videos under"))
        .stdout(predicate::str::contains("  video-1").not())
        .stdout(predicate::str::contains("done (collections)"));
}

#[test]
fn test_cli_collections_verbose_from_env() {
    let collection = Collection::new();
    framesense_cmd()
        .args(["collections", "-v"])
        .env("FRAMESENSE_COLLECTIONS", &collection.manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("  video-1\n  video-2\n"));
}

#[test]
fn test_cli_rejects_unsupported_flags() {
    let collection = Collection::new();
    framesense_cmd()
        .args(["collections", "--redo", "-f", "video-1", "--collections"])
        .arg(&collection.manifest)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "ERROR: operator collections does not support --filter, --redo",
        ));
}

#[test]
fn test_cli_annotations_without_path() {
    let collection = Collection::new();
    framesense_cmd()
        .args(["annotations", "--collections"])
        .arg(&collection.manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("annotations_path not provided"));
}

#[test]
fn test_cli_invalid_config_file() {
    let collection = Collection::new();
    let config = collection.dir.path().join("framesense.toml");
    std::fs::write(&config, "[engine]\nengine = \"podman\"\n").unwrap();

    framesense_cmd()
        .args(["operators", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ERROR: Invalid [engine] engine"));
}
