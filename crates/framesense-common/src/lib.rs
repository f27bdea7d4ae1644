//! Framesense-Common: collections, record files, and the artifact cache.
//!
//! This crate provides the pieces every framesense operator shares:
//!
//! - **Collections**: the `collections.json` manifest and its resolved paths
//! - **Path Utilities**: walking video, clip, shot, and frame folders
//! - **Record Files**: per-folder JSON maps of artifact id → field → record
//! - **Artifact Cache**: fingerprint-gated skip-or-recompute decisions
//! - **Error Handling**: common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use framesense_common::{ArtifactCache, Fingerprint, RecordStore};
//! use framesense_common::paths::frame_id;
//! use std::path::Path;
//!
//! assert_eq!(frame_id(Path::new("0007.jpg")).as_deref(), Some("0007"));
//!
//! let dir = std::env::temp_dir().join("framesense-doc-example");
//! let store = RecordStore::open(dir.join("frames.json")).unwrap();
//! let cache = ArtifactCache::new(false);
//! let fp = Fingerprint::of(["llava", "Describe the frame"]);
//! assert!(!cache.is_fresh(&store, "0007", "caption", &fp));
//! ```

pub mod cache;
pub mod error;
pub mod paths;
pub mod record;
pub mod types;

pub use cache::{ArtifactCache, CacheStats, Computed, Fingerprint, Lookup, ParamSnapshot};
pub use error::{Error, Result};
pub use record::{ArtifactFields, ArtifactRecord, RecordStore, RECORD_FORMAT_VERSION};
pub use types::*;
