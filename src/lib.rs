//! Framesense - pluggable batch runner for media collections
//!
//! This library crate exposes the operator runtime and the built-in operators
//! for integration testing.

pub mod config;
pub mod error;
pub mod operators;
pub mod runtime;

pub use error::{Error, Result};
