//! `answer_videos_vlm`: ask a vision-language model questions about each
//! whole video. Answers go to `<video folder>/video_answers.json`, one field
//! per question key, with the service `stats` kept next to each answer.

use async_trait::async_trait;
use serde_json::{Map, Value};

use framesense_common::{ArtifactCache, Computed, Fingerprint, ParamSnapshot, RecordStore};

use super::support::{parse_dirty_json, questions, render_prompt, video_folders, word_count};
use crate::error::{Error, Result};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "answer_videos_vlm";

pub const ANSWERS_FILE: &str = "video_answers.json";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "Let a VLM answer a question about a video", || {
        Box::new(AnswerVideosVlm)
    });
}

pub struct AnswerVideosVlm;

#[async_trait]
impl Operator for AnswerVideosVlm {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let template = ctx.params.require_text("prompt_template")?;
        let questions = questions(&ctx.params)?;
        let model = ctx.params.text("model");
        let max_new_tokens = ctx.params.value("max_new_tokens");
        let snapshot = ParamSnapshot::new(NAME)
            .with_model(model.clone())
            .with_seed(ctx.params.value("seed"))
            .with_extra("max_new_tokens", max_new_tokens.clone());

        let videos: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| {
                let root = c.root().to_path_buf();
                video_folders(c.root())
                    .into_iter()
                    .map(move |(folder, video)| (root.clone(), folder, video))
            })
            .filter(|(_, _, video)| ctx.args().is_selected(video))
            .collect();

        let mut cache = ArtifactCache::new(ctx.args().redo);
        for (root, folder, video) in videos {
            let mut store = RecordStore::open(folder.join(ANSWERS_FILE))?;
            // One artifact per video, keyed by the folder name.
            let id = folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            for (key, question) in &questions {
                let prompt = render_prompt(&template, &question.question);
                let fingerprint = Fingerprint::of([
                    model.clone().unwrap_or_default(),
                    tokens_text(&max_new_tokens),
                    prompt.clone(),
                ]);

                let ctx = &mut *ctx;
                let (video, root) = (&video, &root);
                cache
                    .get_or_compute(&mut store, &id, key, &fingerprint, &snapshot, move || async move {
                        tracing::info!(
                            "{} (question: {key}; words in prompt: {})",
                            video.display(),
                            word_count(&prompt)
                        );
                        ctx.params.set("prompt", prompt);
                        let response = ctx.call_service(video, root).await?;

                        let mut extra = Map::new();
                        extra.insert(
                            "stats".to_string(),
                            response.stats.unwrap_or_else(|| Value::Object(Map::new())),
                        );
                        Ok::<_, Error>(Computed {
                            value: parse_dirty_json(&response.result),
                            extra,
                        })
                    })
                    .await?;
            }

            store.flush()?;
        }

        ctx.report(cache.stats());
        Ok(())
    }
}

fn tokens_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
