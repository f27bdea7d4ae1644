use async_trait::async_trait;

use framesense_common::paths;

use super::support::{parse_dirty_json, write_json};
use super::transcribe_speech_parakeet::TRANSCRIPTION_FILE;
use crate::error::Result;
use crate::runtime::context::RunOptions;
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "answer_transcription_ollama";

pub const ANSWERS_FILE: &str = "transcription_answers.json";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(
        NAME,
        "Let a LLM served by Ollama answer a question about a transcription",
        || Box::new(AnswerTranscriptionOllama),
    );
}

/// One-shot Ollama call per clip transcription; the answer lands in
/// `transcription_answers.json`.
pub struct AnswerTranscriptionOllama;

#[async_trait]
impl Operator for AnswerTranscriptionOllama {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let clips: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| paths::clip_files(c.root()))
            .collect();

        for clip in clips {
            let Some(clip_dir) = clip.parent() else {
                continue;
            };
            let transcription = clip_dir.join(TRANSCRIPTION_FILE);
            if !ctx.args().is_selected(&transcription) {
                continue;
            }
            if !transcription.exists() {
                tracing::warn!("Input transcription not found: {}", transcription.display());
                continue;
            }

            let answers = clip_dir.join(ANSWERS_FILE);
            if answers.exists() && !ctx.args().redo {
                continue;
            }

            tracing::info!("{}", transcription.display());
            let response = ctx
                .run_processor(
                    &transcription,
                    clip_dir,
                    RunOptions {
                        share_network: true,
                        ..Default::default()
                    },
                )
                .await?;
            let answer = parse_dirty_json(&response.result);
            tracing::debug!("{answer}");
            write_json(&answers, &answer)?;
        }
        Ok(())
    }
}
