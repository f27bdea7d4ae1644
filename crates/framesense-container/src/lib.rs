//! # framesense-container
//!
//! Container orchestration for framesense operators.
//!
//! This crate provides functionality for:
//! - Detecting the container engine (Docker or Singularity) and GPU support
//! - Translating host paths to container paths through declared bindings
//! - Building engine-specific invocations for one-shot calls and services
//! - Building operator images from their Dockerfile when stale
//! - Running a long-lived HTTP service with readiness detection and reuse
//!
//! ## Example
//!
//! ```no_run
//! use framesense_container::{Binding, EngineOptions, EngineRegistry, RunSpec};
//!
//! # async fn example() -> framesense_container::Result<()> {
//! let registry = EngineRegistry::detect(None, EngineOptions::default()).await?;
//! let spec = RunSpec::new("framesense/make_frames_ffmpeg", vec!["python".into(), "main.py".into()])
//!     .binding(Binding::new("/media/col1", "/data"));
//! registry.run(&registry.engine().run_args(&spec)).await?;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod client;
pub mod command;
pub mod engine;
mod error;
pub mod image;
pub mod invocation;
pub mod service;

// Re-exports
pub use binding::{translate, Arg, Binding};
pub use client::{ServiceClient, ServiceResponse};
pub use command::{CommandOutput, CommandRunner};
pub use engine::{ContainerEngine, EngineOptions, EngineRegistry};
pub use error::{Error, Result};
pub use image::{ImageBuilder, ImageOptions};
pub use invocation::{PortMapping, RunSpec, ServiceInvocation, APP_DIR};
pub use service::{ServiceManager, ServiceOptions, ServiceState};
