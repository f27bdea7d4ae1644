//! `answer_frames_ollama`: ask every configured question about every frame.
//!
//! Parameters: `model`, `seed`, `context_length`, `prompt_template` (with
//! `{question}`), `questions` (key → `{question}`) and an optional
//! `frame_filter` substring. Answers are recorded in each shot's
//! `frames.json` under the question key and recomputed when the model, the
//! rendered prompt, the context length or the seed change.

use async_trait::async_trait;

use framesense_common::{paths, ArtifactCache, Computed, Fingerprint, ParamSnapshot, RecordStore};

use super::make_frames_ffmpeg::FRAMES_FILE;
use super::support::{parse_dirty_json, questions, render_prompt, word_count};
use crate::error::Result;
use crate::runtime::context::RunOptions;
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "answer_frames_ollama";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(
        NAME,
        "Let a LLM served by Ollama answer a question about a frame",
        || Box::new(AnswerFramesOllama),
    );
}

pub struct AnswerFramesOllama;

#[async_trait]
impl Operator for AnswerFramesOllama {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let template = ctx.params.require_text("prompt_template")?;
        let questions = questions(&ctx.params)?;
        let model = ctx.params.text_or("model", "");
        let context_length = ctx.params.text_or("context_length", "");
        let seed = ctx.params.text_or("seed", "");
        let frame_filter = ctx.params.text_or("frame_filter", "");
        let snapshot = ParamSnapshot::new(NAME)
            .with_model(ctx.params.text("model"))
            .with_seed(ctx.params.value("seed"))
            .with_extra("context_length", ctx.params.value("context_length"));

        let shot_dirs: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| paths::shot_folders(c.root()))
            .collect();

        let mut cache = ArtifactCache::new(ctx.args().redo);
        for shot_dir in shot_dirs {
            let mut store = RecordStore::open(shot_dir.join(FRAMES_FILE))?;

            for frame in paths::frame_files(&shot_dir) {
                if !frame.to_string_lossy().contains(frame_filter.as_str())
                    || !ctx.args().is_selected(&frame)
                {
                    continue;
                }
                let Some(id) = paths::frame_id(&frame) else {
                    continue;
                };

                for (key, question) in &questions {
                    let prompt = render_prompt(&template, &question.question);
                    let fingerprint = Fingerprint::of([
                        model.as_str(),
                        prompt.as_str(),
                        context_length.as_str(),
                        seed.as_str(),
                    ]);

                    let ctx = &mut *ctx;
                    let (frame, shot_dir) = (&frame, &shot_dir);
                    cache
                        .get_or_compute(&mut store, &id, key, &fingerprint, &snapshot, move || async move {
                            tracing::info!(
                                "{} (question: {key}; words in prompt: {})",
                                frame.display(),
                                word_count(&prompt)
                            );
                            ctx.params.set("prompt", prompt);
                            let response = ctx
                                .run_processor(
                                    frame,
                                    shot_dir,
                                    RunOptions {
                                        share_network: true,
                                        ..Default::default()
                                    },
                                )
                                .await?;
                            Ok::<_, crate::error::Error>(Computed::from(parse_dirty_json(&response.result)))
                        })
                        .await?;
                }
            }

            store.flush()?;
        }

        ctx.report(cache.stats());
        Ok(())
    }
}
