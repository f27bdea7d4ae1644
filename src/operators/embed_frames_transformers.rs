use async_trait::async_trait;

use framesense_common::{paths, ArtifactCache, Computed, Fingerprint, ParamSnapshot, RecordStore};

use super::make_frames_ffmpeg::FRAMES_FILE;
use super::support::parse_dirty_json;
use crate::error::{Error, Result};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "embed_frames_transformers";

/// Record field holding the vector.
pub const EMBEDDING_FIELD: &str = "embedding";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(
        NAME,
        "Generate a vector from a frame using an embedding model",
        || Box::new(EmbedFramesTransformers),
    );
}

/// Embeds every frame with the `model` parameter through the operator's
/// service. Only a model change invalidates a stored embedding.
pub struct EmbedFramesTransformers;

#[async_trait]
impl Operator for EmbedFramesTransformers {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let model = ctx.params.text("model");
        let frame_filter = ctx.params.text_or("frame_filter", "");
        let fingerprint = Fingerprint::of([model.as_deref().unwrap_or_default()]);
        let snapshot = ParamSnapshot::new(NAME)
            .with_model(model)
            .with_seed(ctx.params.value("seed"));

        let shot_dirs: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| {
                let root = c.root().to_path_buf();
                paths::shot_folders(c.root())
                    .into_iter()
                    .map(move |dir| (root.clone(), dir))
            })
            .collect();

        let mut cache = ArtifactCache::new(ctx.args().redo);
        for (root, shot_dir) in shot_dirs {
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

                let ctx = &mut *ctx;
                let (frame, root) = (&frame, &root);
                cache
                    .get_or_compute(&mut store, &id, EMBEDDING_FIELD, &fingerprint, &snapshot, move || async move {
                        tracing::info!("{}", frame.display());
                        let response = ctx.call_service(frame, root).await?;
                        Ok::<_, Error>(Computed::from(parse_dirty_json(&response.result)))
                    })
                    .await?;
            }

            store.flush()?;
        }

        ctx.report(cache.stats());
        Ok(())
    }
}
