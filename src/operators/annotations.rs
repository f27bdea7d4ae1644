//! Annotation files: `<annotations_path>/<video name>.json` holding the clips
//! to cut from that video.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use framesense_common::paths;

use crate::error::{Error, Result};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "annotations";

const NO_VIDEO_FOLDER: &str = "NO VIDEO FOLDER";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "List all annotation files", || Box::new(ListAnnotations));
}

/// One clip of an annotation file, timecodes as `HH:MM:SS`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipAnnotation {
    #[serde(rename = "startTime", default)]
    pub start_time: String,
    #[serde(rename = "endTime", default)]
    pub end_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationFile {
    #[serde(default)]
    pub clips: Vec<ClipAnnotation>,
}

impl AnnotationFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // `null` is accepted as an empty file.
        let file: Option<AnnotationFile> = serde_json::from_str(&content).map_err(|e| {
            Error::operator(format!("invalid annotation file {}: {e}", path.display()))
        })?;
        Ok(file.unwrap_or_default())
    }
}

/// `*.json` files of an annotation directory, sorted.
pub fn annotation_files(dir: &Path) -> Vec<PathBuf> {
    paths::files_matching(dir, |p| p.extension().is_some_and(|e| e == "json"))
}

/// Name of the video an annotation file describes.
pub fn video_name(annotation: &Path) -> String {
    annotation
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct ListAnnotations;

#[async_trait]
impl Operator for ListAnnotations {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Verbose]
    }

    fn uses_containers(&self) -> bool {
        false
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        for collection in ctx.collections() {
            println!("{}", collection.id);
            let Some(dir) = collection.annotations_dir() else {
                println!("  annotations_path not provided in collections manifest");
                continue;
            };
            if !dir.is_dir() {
                println!("  annotations_path not found ({})", dir.display());
                continue;
            }

            let files = annotation_files(dir);
            if ctx.args().verbose {
                for file in &files {
                    let name = video_name(file);
                    let clips = match AnnotationFile::load(file) {
                        Ok(annotation) => annotation.clips.len(),
                        Err(e) => {
                            tracing::warn!("{e}");
                            0
                        }
                    };
                    let matched = if collection.root().join(&name).is_dir() {
                        ""
                    } else {
                        NO_VIDEO_FOLDER
                    };
                    println!("  {clips:3} clips {matched:15} \"{name}\"");
                }
            }
            println!("  {} annotation files under {}", files.len(), dir.display());
        }
        Ok(())
    }
}
