//! `make_clips_ffmpeg`: cut the annotated clips out of each video.
//!
//! Annotation files are matched to video folders by `<collection id>:<slug>`
//! where the slug is taken from the file stem and the folder name.

use async_trait::async_trait;
use chrono::NaiveTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use framesense_common::paths;
use framesense_container::{Arg, Binding};

use super::annotations::{annotation_files, AnnotationFile, ClipAnnotation};
use crate::error::Result;
use crate::runtime::context::{RunOptions, DATA_DIR};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "make_clips_ffmpeg";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(
        NAME,
        "Extract clips from videos based on timecodes in annotation files",
        || Box::new(MakeClipsFfmpeg),
    );
}

/// A clip to cut: start timecode, length, and target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSpec {
    pub start: String,
    pub duration_secs: i64,
    pub path: PathBuf,
}

impl ClipSpec {
    /// `<video folder>/<HH.MM.SS-duration>/<HH.MM.SS-duration>.mp4`, or `None`
    /// when a timecode is not `HH:MM:SS`.
    pub fn from_annotation(annotation: &ClipAnnotation, video_folder: &Path) -> Option<Self> {
        let start_text = annotation.start_time.trim();
        let start = parse_timecode(start_text)?;
        let end = parse_timecode(annotation.end_time.trim())?;

        let duration_secs = (end - start).num_seconds();
        let name = format!("{}-{duration_secs}", start_text.replace(':', "."));
        Some(Self {
            start: start_text.to_string(),
            duration_secs,
            path: video_folder.join(&name).join(format!("{name}.mp4")),
        })
    }
}

fn parse_timecode(text: &str) -> Option<NaiveTime> {
    let valid = text.len() == 8
        && text
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 2 || i == 5 { b == b':' } else { b.is_ascii_digit() });
    if !valid {
        return None;
    }
    NaiveTime::parse_from_str(text, "%H:%M:%S").ok()
}

/// Match key shared by an annotation file and its video folder.
pub fn match_key(collection_id: &str, name: &str) -> String {
    format!("{collection_id}:{}", paths::slugify(name))
}

pub struct MakeClipsFfmpeg;

#[async_trait]
impl Operator for MakeClipsFfmpeg {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::DryRun]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let mut index: HashMap<String, PathBuf> = HashMap::new();
        for collection in ctx.collections() {
            let Some(dir) = collection.annotations_dir() else {
                continue;
            };
            for file in annotation_files(dir) {
                let stem = super::annotations::video_name(&file);
                index.insert(match_key(&collection.id, &stem), file);
            }
        }

        let mut jobs = Vec::new();
        for collection in ctx.collections() {
            for folder in paths::subdirectories(collection.root()) {
                let name = folder
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let Some(annotation_path) = index.get(&match_key(&collection.id, &name)) else {
                    continue;
                };
                let annotation = match AnnotationFile::load(annotation_path) {
                    Ok(annotation) => annotation,
                    Err(e) => {
                        tracing::warn!("{e}");
                        continue;
                    }
                };
                for clip in &annotation.clips {
                    match ClipSpec::from_annotation(clip, &folder) {
                        Some(spec) => jobs.push((folder.clone(), spec)),
                        None => tracing::warn!(
                            "Invalid timecode in {}, please use HH:MM:SS",
                            annotation_path.display()
                        ),
                    }
                }
            }
        }

        for (folder, clip) in jobs {
            let Some(video) = paths::find_video_file(&folder) else {
                continue;
            };
            if !ctx.args().is_selected(&clip.path) || clip.path.exists() {
                continue;
            }
            if clip.duration_secs <= 0 {
                tracing::warn!("Skipping {}: end is not after start", clip.path.display());
                continue;
            }

            tracing::info!("{}", clip.path.display());
            if ctx.args().dry_run {
                continue;
            }
            if let Some(parent) = clip.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let args = [
                Arg::from("ffmpeg"),
                Arg::from("-ss"),
                Arg::from(clip.start.as_str()),
                Arg::from("-t"),
                Arg::from(clip.duration_secs.to_string()),
                Arg::from("-i"),
                Arg::from(video.as_path()),
                Arg::from(clip.path.as_path()),
            ];
            ctx.run_in_container(
                &args,
                Binding::new(&folder, DATA_DIR),
                RunOptions {
                    same_user: true,
                    ..Default::default()
                },
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(start: &str, end: &str) -> ClipAnnotation {
        ClipAnnotation {
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn test_clip_spec_from_timecodes() {
        let spec = ClipSpec::from_annotation(&annotation("00:58:16", "01:03:14"), Path::new("/m/v1")).unwrap();
        assert_eq!(spec.start, "00:58:16");
        assert_eq!(spec.duration_secs, 298);
        assert_eq!(spec.path, PathBuf::from("/m/v1/00.58.16-298/00.58.16-298.mp4"));
    }

    #[test]
    fn test_invalid_timecodes() {
        assert!(ClipSpec::from_annotation(&annotation("0:58:16", "01:03:14"), Path::new("/m")).is_none());
        assert!(ClipSpec::from_annotation(&annotation("00:58:16", ""), Path::new("/m")).is_none());
        assert!(ClipSpec::from_annotation(&annotation("00:61:00", "01:03:14"), Path::new("/m")).is_none());
    }

    #[test]
    fn test_match_key_slugifies() {
        assert_eq!(match_key("col1", "My Video (2021)"), "col1:my-video-2021");
        assert_eq!(match_key("col1", "my-video-2021"), match_key("col1", "My Video 2021"));
    }
}
