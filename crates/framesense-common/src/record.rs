//! Per-folder JSON record files.
//!
//! A record file (`frames.json`, `video_answers.json`, ...) holds one entry per
//! artifact id, and for each artifact one [`ArtifactRecord`] per field:
//!
//! ```json
//! {
//!   "meta": {"format_version": 1},
//!   "data": {
//!     "0001": {
//!       "caption": {"value": "...", "operator": "answer_frames_ollama",
//!                   "model": "...", "seed": 42,
//!                   "updated": "2025-01-01T00:00:00Z", "prompt_hash": "1a2b3c4d"}
//!     }
//!   }
//! }
//! ```
//!
//! The map keyed by artifact id is the only accepted shape. Files are written
//! whole; a crash in the middle of a folder loses that folder's new results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Version written to `meta.format_version`.
pub const RECORD_FORMAT_VERSION: u64 = 1;

/// One cached value and the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub value: Value,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub seed: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_hash: Option<String>,
    /// Operator specific extras (`max_new_tokens`, `stats`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields of one artifact, keyed by field name.
pub type ArtifactFields = BTreeMap<String, ArtifactRecord>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    data: BTreeMap<String, ArtifactFields>,
}

/// An open record file. Mutations stay in memory until [`RecordStore::flush`].
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    file: RecordFile,
    dirty: bool,
}

impl RecordStore {
    /// Open the record file at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            parse_record_file(&path, &content)?
        } else {
            RecordFile::default()
        };

        Ok(Self {
            path,
            file,
            dirty: false,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the record stored for `field` of artifact `id`.
    pub fn get(&self, id: &str, field: &str) -> Option<&ArtifactRecord> {
        self.file.data.get(id).and_then(|fields| fields.get(field))
    }

    /// All fields of artifact `id`.
    pub fn artifact(&self, id: &str) -> Option<&ArtifactFields> {
        self.file.data.get(id)
    }

    /// Artifact ids in the store, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.file.data.keys().map(String::as_str)
    }

    /// Store `record` as `field` of artifact `id`, creating the artifact lazily.
    pub fn insert(&mut self, id: &str, field: &str, record: ArtifactRecord) {
        self.file
            .data
            .entry(id.to_string())
            .or_default()
            .insert(field.to_string(), record);
        self.dirty = true;
    }

    /// Free-form metadata stored next to the data.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.file.meta
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overwrite the backing file if anything changed. Returns whether a write
    /// happened.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        self.file.meta.insert(
            "format_version".to_string(),
            Value::from(RECORD_FORMAT_VERSION),
        );
        let content = serde_json::to_string_pretty(&self.file)?;
        std::fs::write(&self.path, content)?;
        self.dirty = false;

        tracing::debug!("Wrote record file {}", self.path.display());
        Ok(true)
    }
}

fn parse_record_file(path: &Path, content: &str) -> Result<RecordFile> {
    let raw: Value = serde_json::from_str(content).map_err(|source| Error::MalformedRecord {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Object(mut root) = raw else {
        return Err(Error::unsupported_record(path, "top level is not an object"));
    };

    let meta = match root.remove("meta") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(meta)) => meta,
        Some(_) => return Err(Error::unsupported_record(path, "meta is not an object")),
    };

    if let Some(version) = meta.get("format_version") {
        match version.as_u64() {
            Some(v) if v <= RECORD_FORMAT_VERSION => {}
            _ => {
                return Err(Error::unsupported_record(
                    path,
                    format!("format_version {version} is not supported"),
                ))
            }
        }
    }

    let data = match root.remove("data") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Array(_)) => {
            return Err(Error::unsupported_record(
                path,
                "data is an array, expected a map keyed by artifact id",
            ))
        }
        Some(data) => serde_json::from_value(data).map_err(|source| Error::MalformedRecord {
            path: path.to_path_buf(),
            source,
        })?,
    };

    Ok(RecordFile { meta, data })
}
