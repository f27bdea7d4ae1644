//! `transcribe_speech_parakeet`: speech to text for every clip sound file,
//! through the operator's service.

use async_trait::async_trait;

use framesense_common::paths;

use super::support::write_json;
use crate::error::Result;
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "transcribe_speech_parakeet";

/// Transcription written next to each clip.
pub const TRANSCRIPTION_FILE: &str = "transcription.json";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(
        NAME,
        "Transcribe speech from sound files into json files",
        || Box::new(TranscribeSpeechParakeet),
    );
}

pub struct TranscribeSpeechParakeet;

#[async_trait]
impl Operator for TranscribeSpeechParakeet {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let jobs: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| {
                let root = c.root().to_path_buf();
                paths::clip_files(c.root())
                    .into_iter()
                    .map(move |clip| (root.clone(), clip))
            })
            .collect();

        for (root, clip) in jobs {
            let sound = clip.with_extension("wav");
            if !ctx.args().is_selected(&sound) {
                continue;
            }
            if !sound.exists() {
                tracing::warn!("Input sound not found: {}", sound.display());
                continue;
            }

            let Some(clip_dir) = clip.parent() else {
                continue;
            };
            let transcription = clip_dir.join(TRANSCRIPTION_FILE);
            if transcription.exists() && !ctx.args().redo {
                continue;
            }

            tracing::info!("{}", transcription.display());
            let response = ctx.call_service(&sound, &root).await?;
            write_json(&transcription, &response.result)?;
        }
        Ok(())
    }
}
