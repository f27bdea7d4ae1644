use async_trait::async_trait;

use framesense_common::paths;
use framesense_container::{Arg, Binding};

use crate::error::Result;
use crate::runtime::context::{RunOptions, DATA_DIR};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "extract_sound_ffmpeg";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "Extract sound from clips using FFMPEG", || {
        Box::new(ExtractSoundFfmpeg)
    });
}

/// Writes `<clip>.wav` from the first audio stream of each clip.
pub struct ExtractSoundFfmpeg;

#[async_trait]
impl Operator for ExtractSoundFfmpeg {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo, ArgumentKind::DryRun]
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
            let sound = clip.with_extension("wav");
            if sound.exists() && !ctx.args().redo {
                continue;
            }
            tracing::info!("{}", sound.display());
            if ctx.args().dry_run {
                continue;
            }

            let Some(clip_dir) = clip.parent() else {
                continue;
            };
            let args = [
                Arg::from("ffmpeg"),
                Arg::from("-i"),
                Arg::from(clip.as_path()),
                Arg::from("-map"),
                Arg::from("0:a"),
                Arg::from("-y"),
                Arg::from(sound.as_path()),
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
        Ok(())
    }
}
