//! Operator parameter maps.
//!
//! Defaults come from `<operator dir>/params.json`, overrides from the config
//! file. The merged map is written to `<operator dir>/app/params.json` before
//! every container call so the in-container code reads it as
//! `/app/params.json`.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File holding parameter defaults (in the operator dir) and the merged map
/// (in its `app` dir).
pub const PARAMS_FILE: &str = "params.json";

/// Directory of an operator's companion code, bound to `/app`.
pub const APP_SUBDIR: &str = "app";

/// Merged parameters of one operator.
#[derive(Debug, Clone, Default)]
pub struct OperatorParams {
    values: Map<String, Value>,
    app_dir: PathBuf,
}

impl OperatorParams {
    /// Read defaults from `operator_dir` and apply `overrides` on top.
    pub fn load(operator_dir: &Path, overrides: Option<&Map<String, Value>>) -> Result<Self> {
        let defaults_path = operator_dir.join(PARAMS_FILE);
        let mut values = if defaults_path.is_file() {
            match serde_json::from_str::<Value>(&std::fs::read_to_string(&defaults_path)?)? {
                Value::Object(map) => map,
                _ => {
                    return Err(Error::config(format!(
                        "{} must contain a JSON object",
                        defaults_path.display()
                    )))
                }
            }
        } else {
            Map::new()
        };

        if let Some(overrides) = overrides {
            values.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Ok(Self {
            values,
            app_dir: operator_dir.join(APP_SUBDIR),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value of `key`, rendering numbers and booleans as text.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    /// Like [`OperatorParams::text`] but a missing key is a configuration error.
    pub fn require_text(&self, key: &str) -> Result<String> {
        self.text(key)
            .ok_or_else(|| Error::config(format!("missing operator parameter '{key}'")))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        match self.values.get(key) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// The value of `key` as stored, `null` when absent.
    pub fn value(&self, key: &str) -> Value {
        self.values.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Write the merged map where the container expects it.
    pub fn write(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.app_dir)?;
        let path = self.app_dir.join(PARAMS_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(&self.values)?)?;
        tracing::trace!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_overrides_win_over_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(PARAMS_FILE),
            r#"{"model": "llava", "seed": 1, "context_length": 4096}"#,
        )
        .unwrap();
        let overrides = json!({"model": "qwen2.5vl", "seed": 2});

        let params = OperatorParams::load(dir.path(), overrides.as_object()).unwrap();
        assert_eq!(params.text("model").as_deref(), Some("qwen2.5vl"));
        assert_eq!(params.text("seed").as_deref(), Some("2"));
        assert_eq!(params.u64_or("context_length", 0), 4096);
        assert_eq!(params.u64_or("missing", 7), 7);
        assert!(params.require_text("prompt").is_err());
    }

    #[test]
    fn test_missing_defaults_is_empty() {
        let dir = tempdir().unwrap();
        let params = OperatorParams::load(dir.path(), None).unwrap();
        assert!(params.values().is_empty());
        assert_eq!(params.value("seed"), Value::Null);
    }

    #[test]
    fn test_non_object_defaults_are_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(PARAMS_FILE), "[1, 2]").unwrap();
        assert!(OperatorParams::load(dir.path(), None).is_err());
    }

    #[test]
    fn test_write_goes_to_app_dir() {
        let dir = tempdir().unwrap();
        let mut params = OperatorParams::load(dir.path(), None).unwrap();
        params.set("prompt", "Describe the frame");

        let written = params.write().unwrap();
        assert_eq!(written, dir.path().join("app").join(PARAMS_FILE));
        let content: Value =
            serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(content["prompt"], "Describe the frame");
    }
}
