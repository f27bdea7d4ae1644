//! `make_frames_ffmpeg`: extract still frames from every shot.
//!
//! Without `--parameters` three frames are taken at 0%, 50% and 95% of the
//! shot duration (100% would miss the last frame). With `--parameters` the
//! value is passed to ffmpeg as a `-vf` filter, e.g. `fps=2`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use framesense_common::paths;
use framesense_container::{Arg, Binding};

use crate::error::{Error, Result};
use crate::runtime::context::{RunOptions, DATA_DIR};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "make_frames_ffmpeg";

/// Record file of a shot folder.
pub const FRAMES_FILE: &str = "frames.json";

const SAMPLE_PLACES: [f64; 3] = [0.0, 0.5, 0.95];

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "Extract frames from shots using ffmpeg", || {
        Box::new(MakeFramesFfmpeg)
    });
}

/// `H:MM:SS.mmm` seek position.
pub fn seek_position(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let (secs, millis) = (millis / 1000, millis % 1000);
    format!("{}:{:02}:{:02}.{millis:03}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Duration in seconds from `ffprobe -of json` output.
pub fn probe_duration(stdout: &str) -> Result<f64> {
    let probe: Value = serde_json::from_str(stdout)?;
    let duration = &probe["format"]["duration"];
    duration
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| duration.as_f64())
        .ok_or_else(|| Error::operator("ffprobe output has no format.duration"))
}

/// ffmpeg output arguments grabbing one frame per sample place.
pub fn sample_args(shot_dir: &Path, duration: f64) -> Vec<Arg> {
    SAMPLE_PLACES
        .iter()
        .enumerate()
        .flat_map(|(i, place)| {
            [
                Arg::from("-ss"),
                Arg::from(seek_position(duration * place)),
                Arg::from("-vframes"),
                Arg::from("1"),
                Arg::from(shot_dir.join(format!("{:04}.jpg", i + 1))),
            ]
        })
        .collect()
}

/// ffmpeg output arguments applying a user supplied `-vf` filter.
pub fn filter_args(shot_dir: &Path, filter: &str) -> Vec<Arg> {
    vec![
        Arg::from("-vf"),
        Arg::from(filter),
        Arg::from("-vsync"),
        Arg::from("vfr"),
        Arg::from(shot_dir.join("%04d.jpg")),
    ]
}

fn remove_frames(shot_dir: &Path, frames: &[PathBuf]) -> Result<()> {
    for frame in frames {
        std::fs::remove_file(frame)?;
    }
    let records = shot_dir.join(FRAMES_FILE);
    if records.exists() {
        std::fs::remove_file(records)?;
    }
    Ok(())
}

pub struct MakeFramesFfmpeg;

#[async_trait]
impl Operator for MakeFramesFfmpeg {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[
            ArgumentKind::Filter,
            ArgumentKind::Redo,
            ArgumentKind::Parameters,
            ArgumentKind::DryRun,
        ]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let shots: Vec<(PathBuf, PathBuf)> = ctx
            .collections()
            .iter()
            .flat_map(|c| paths::shot_folders(c.root()))
            .filter_map(|dir| paths::find_video_file(&dir).map(|shot| (dir, shot)))
            .filter(|(_, shot)| ctx.args().is_selected(shot))
            .collect();

        let filter = ctx.args().parameters.clone().filter(|p| !p.trim().is_empty());
        let options = RunOptions {
            same_user: true,
            ..Default::default()
        };

        for (shot_dir, shot) in shots {
            let mut frames = paths::frame_files(&shot_dir);
            if ctx.args().redo && !frames.is_empty() {
                if ctx.args().dry_run {
                    tracing::info!("Would remove {} frames in {}", frames.len(), shot_dir.display());
                } else {
                    remove_frames(&shot_dir, &frames)?;
                }
                frames.clear();
            }
            if !frames.is_empty() {
                continue;
            }

            tracing::info!("{}", shot.display());
            if ctx.args().dry_run {
                continue;
            }

            let binding = Binding::new(&shot_dir, DATA_DIR);
            let samples = match &filter {
                Some(filter) => filter_args(&shot_dir, filter),
                None => {
                    let probe = [
                        Arg::from("ffprobe"),
                        Arg::from("-v"),
                        Arg::from("error"),
                        Arg::from("-select_streams"),
                        Arg::from("v:0"),
                        Arg::from("-show_entries"),
                        Arg::from("format=duration:stream=nb_frames"),
                        Arg::from("-of"),
                        Arg::from("json"),
                        Arg::from(shot.as_path()),
                    ];
                    let output = ctx
                        .run_in_container(&probe, binding.clone(), RunOptions::default())
                        .await?;
                    sample_args(&shot_dir, probe_duration(&output.stdout)?)
                }
            };

            let mut args = vec![Arg::from("ffmpeg"), Arg::from("-i"), Arg::from(shot.as_path())];
            args.extend(samples);
            ctx.run_in_container(&args, binding, options).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framesense_container::translate;
    use tempfile::tempdir;

    #[test]
    fn test_seek_position() {
        assert_eq!(seek_position(0.0), "0:00:00.000");
        assert_eq!(seek_position(1.5), "0:00:01.500");
        assert_eq!(seek_position(3725.5), "1:02:05.500");
    }

    #[test]
    fn test_probe_duration() {
        let stdout = r#"{"programs": [], "streams": [{"nb_frames": "30"}], "format": {"duration": "1.250000"}}"#;
        assert_eq!(probe_duration(stdout).unwrap(), 1.25);
        assert!(probe_duration(r#"{"format": {}}"#).is_err());
        assert!(probe_duration("not json").is_err());
    }

    #[test]
    fn test_sample_args_are_translated() {
        let shot_dir = Path::new("/m/v1/c1/shots/001");
        let bindings = [Binding::new(shot_dir, DATA_DIR)];
        let args = translate(&bindings, &sample_args(shot_dir, 10.0));
        assert_eq!(
            args,
            [
                "-ss", "0:00:00.000", "-vframes", "1", "/data/0001.jpg",
                "-ss", "0:00:05.000", "-vframes", "1", "/data/0002.jpg",
                "-ss", "0:00:09.500", "-vframes", "1", "/data/0003.jpg",
            ]
        );

        let args = translate(&bindings, &filter_args(shot_dir, "fps=2"));
        assert_eq!(args, ["-vf", "fps=2", "-vsync", "vfr", "/data/%04d.jpg"]);
    }

    #[test]
    fn test_remove_frames() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0001.jpg"), b"").unwrap();
        std::fs::write(dir.path().join(FRAMES_FILE), "{}").unwrap();
        std::fs::write(dir.path().join("shot.mp4"), b"").unwrap();

        let frames = paths::frame_files(dir.path());
        remove_frames(dir.path(), &frames).unwrap();
        assert!(paths::frame_files(dir.path()).is_empty());
        assert!(!dir.path().join(FRAMES_FILE).exists());
        assert!(dir.path().join("shot.mp4").exists());
    }
}
