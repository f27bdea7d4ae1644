//! `make_shots_scenedetect`: split every clip into shots with PySceneDetect.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use framesense_common::paths::{self, SHOTS_FOLDER};
use framesense_container::{Arg, Binding};

use crate::error::Result;
use crate::runtime::context::{RunOptions, DATA_DIR};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "make_shots_scenedetect";

/// File every shot video is moved to inside its `shots/NNN/` folder.
pub const SHOT_FILE: &str = "shot.mp4";

/// Scene list written next to the shot folders.
pub const SHOTS_CSV: &str = "shots.csv";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "Extract shots from clips using PySceneDetect", || {
        Box::new(MakeShotsSceneDetect)
    });
}

/// Move `*-Scene-NNN.mp4` to `NNN/shot.mp4` and `*-Scenes.csv` to
/// `shots.csv`. Returns the number of shots moved.
pub fn organise_shots(shots_dir: &Path) -> Result<usize> {
    static SCENE: OnceLock<Regex> = OnceLock::new();
    let re = SCENE.get_or_init(|| Regex::new(r"Scene-(\d+)\.mp4$").expect("valid regex"));

    let mut moved = 0;
    for file in paths::files_matching(shots_dir, paths::is_video_file) {
        let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let Some(index) = re.captures(&name).map(|c| c[1].to_string()) else {
            continue;
        };
        let shot_dir = shots_dir.join(index);
        std::fs::create_dir_all(&shot_dir)?;
        std::fs::rename(&file, shot_dir.join(SHOT_FILE))?;
        moved += 1;
    }

    for csv in paths::files_matching(shots_dir, |p| {
        p.file_name().is_some_and(|n| n.to_string_lossy().ends_with("-Scenes.csv"))
    }) {
        std::fs::rename(csv, shots_dir.join(SHOTS_CSV))?;
    }
    Ok(moved)
}

pub struct MakeShotsSceneDetect;

#[async_trait]
impl Operator for MakeShotsSceneDetect {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::DryRun]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let clips: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| paths::clip_files(c.root()))
            .filter(|clip| ctx.args().is_selected(clip))
            .collect();

        for clip in clips {
            let Some(clip_dir) = clip.parent() else {
                continue;
            };
            let shots_dir = clip_dir.join(SHOTS_FOLDER);
            if !shots_dir.exists() {
                tracing::info!("{}", clip.display());
                if ctx.args().dry_run {
                    continue;
                }
                std::fs::create_dir_all(&shots_dir)?;
                let args = [
                    Arg::from("scenedetect"),
                    Arg::from("--input"),
                    Arg::from(clip.as_path()),
                    Arg::from("--output"),
                    Arg::from(shots_dir.as_path()),
                    Arg::from("detect-adaptive"),
                    Arg::from("list-scenes"),
                    Arg::from("split-video"),
                ];
                ctx.run_in_container(
                    &args,
                    Binding::new(clip_dir, DATA_DIR),
                    RunOptions {
                        same_user: true,
                        ..Default::default()
                    },
                )
                .await?;
            }

            if !ctx.args().dry_run {
                let moved = organise_shots(&shots_dir)?;
                if moved > 0 {
                    tracing::debug!("Moved {moved} shots under {}", shots_dir.display());
                }
            }
        }
        Ok(())
    }
}
