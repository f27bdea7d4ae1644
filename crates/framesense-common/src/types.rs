//! Collection types and the collections manifest loader.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Filesystem locations of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAttributes {
    /// Root directory holding one folder per video.
    pub path: PathBuf,
    /// Directory of per-video annotation files (`<video name>.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations_path: Option<PathBuf>,
}

/// A declared media collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub attributes: CollectionAttributes,
}

impl Collection {
    /// Root directory of the collection.
    pub fn root(&self) -> &Path {
        &self.attributes.path
    }

    /// Annotation directory, if declared.
    pub fn annotations_dir(&self) -> Option<&Path> {
        self.attributes.annotations_path.as_deref()
    }
}

/// The collections manifest (`collections.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsManifest {
    pub data: Vec<Collection>,
}

impl CollectionsManifest {
    /// Read a manifest and resolve every relative path against the manifest's
    /// own directory.
    pub fn load(path: &Path) -> Result<(PathBuf, Self)> {
        if !path.is_file() {
            return Err(Error::not_found(path));
        }
        let manifest_path = path.canonicalize()?;
        let content = std::fs::read_to_string(&manifest_path)?;
        let mut manifest: CollectionsManifest = serde_json::from_str(&content)
            .map_err(|e| Error::invalid_manifest(&manifest_path, e.to_string()))?;

        let base = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        for collection in &mut manifest.data {
            if collection.id.is_empty() {
                return Err(Error::invalid_manifest(
                    &manifest_path,
                    "collection with an empty id",
                ));
            }
            let attrs = &mut collection.attributes;
            attrs.path = resolve_against(&base, &attrs.path);
            attrs.annotations_path = attrs
                .annotations_path
                .take()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| resolve_against(&base, &p));
        }

        tracing::debug!(
            "Loaded {} collections from {}",
            manifest.data.len(),
            manifest_path.display()
        );

        Ok((manifest_path, manifest))
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    joined.canonicalize().unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("media/col1")).unwrap();
        fs::create_dir_all(dir.path().join("annotations")).unwrap();
        let manifest_path = dir.path().join("collections.json");
        fs::write(
            &manifest_path,
            r#"{"data": [
                {"id": "col1", "attributes": {"path": "media/col1", "annotations_path": "annotations"}},
                {"id": "col2", "attributes": {"path": "/absolute/col2"}}
            ]}"#,
        )
        .unwrap();

        let (resolved, manifest) = CollectionsManifest::load(&manifest_path).unwrap();
        let base = dir.path().canonicalize().unwrap();

        assert_eq!(resolved, base.join("collections.json"));
        assert_eq!(manifest.data.len(), 2);
        assert_eq!(manifest.data[0].root(), base.join("media/col1"));
        assert_eq!(
            manifest.data[0].annotations_dir(),
            Some(base.join("annotations").as_path())
        );
        assert_eq!(manifest.data[1].root(), Path::new("/absolute/col2"));
        assert_eq!(manifest.data[1].annotations_dir(), None);
    }

    #[test]
    fn test_load_missing_manifest() {
        let err = CollectionsManifest::load(Path::new("/nonexistent/collections.json"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_load_malformed_manifest() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("collections.json");
        fs::write(&manifest_path, r#"{"collections": []}"#).unwrap();

        let err = CollectionsManifest::load(&manifest_path).unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { .. }));
    }
}
