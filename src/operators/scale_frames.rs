//! Shot scale classification of frames.
//!
//! [`ScaleFrames`] walks the shot folders and records `shot_scale` for every
//! frame; the classification itself is delegated to a
//! [`FrameScaleClassifier`] backend. Each backend is registered as its own
//! operator (`scale_frames_<backend>`).

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use framesense_common::{paths, ArtifactCache, Computed, Fingerprint, ParamSnapshot, RecordStore};

use super::make_frames_ffmpeg::FRAMES_FILE;
use crate::error::{Error, Result};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

/// Record field holding the scale label.
pub const SCALE_FIELD: &str = "shot_scale";

/// Labels from extreme close shot to long shot.
pub const SCALES: [&str; 5] = ["ECS", "CS", "MS", "FS", "LS"];

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(
        Sssabet::OPERATOR,
        "Shot scale classification from frames based on github.com/sssabet/Shot_Type_Classification",
        || Box::new(ScaleFrames::new(Sssabet)),
    );
}

/// A shot scale classification backend.
#[async_trait]
pub trait FrameScaleClassifier: Send {
    /// Name recorded as the record's `method`.
    fn method(&self) -> &'static str;

    /// Classify one frame, returning one of [`SCALES`].
    async fn classify(
        &mut self,
        ctx: &mut OperatorContext,
        frame: &Path,
        collection_root: &Path,
    ) -> Result<String>;
}

/// MobileNetV3 classifier by Saeed Shafiee Sabet, served by the operator's
/// container.
pub struct Sssabet;

impl Sssabet {
    pub const OPERATOR: &'static str = "scale_frames_sssabet";
}

#[async_trait]
impl FrameScaleClassifier for Sssabet {
    fn method(&self) -> &'static str {
        "sssabet"
    }

    async fn classify(
        &mut self,
        ctx: &mut OperatorContext,
        frame: &Path,
        collection_root: &Path,
    ) -> Result<String> {
        let response = ctx.call_service(frame, collection_root).await?;
        match response.result {
            Value::String(label) => Ok(label.trim().to_string()),
            other => Err(Error::operator(format!(
                "unexpected scale for {}: {other}",
                frame.display()
            ))),
        }
    }
}

pub struct ScaleFrames<C> {
    classifier: C,
}

impl<C: FrameScaleClassifier> ScaleFrames<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl<C: FrameScaleClassifier> Operator for ScaleFrames<C> {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let method = self.classifier.method();
        let model = ctx.params.text("model");
        let fingerprint = Fingerprint::of([model.as_deref().unwrap_or_default(), method]);
        let snapshot = ParamSnapshot::new(ctx.name())
            .with_model(model.clone())
            .with_seed(ctx.params.value("seed"))
            .with_extra("method", Value::from(method));

        let shot_dirs: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| {
                let root = c.root().to_path_buf();
                paths::shot_folders(c.root())
                    .into_iter()
                    .map(move |dir| (root.clone(), dir))
            })
            .filter(|(_, dir)| ctx.args().is_selected(dir))
            .collect();

        let mut cache = ArtifactCache::new(ctx.args().redo);
        for (root, shot_dir) in shot_dirs {
            let mut store = RecordStore::open(shot_dir.join(FRAMES_FILE))?;

            for frame in paths::frame_files(&shot_dir) {
                let Some(id) = paths::frame_id(&frame) else {
                    continue;
                };

                let ctx = &mut *ctx;
                let classifier = &mut self.classifier;
                let (frame, root) = (&frame, &root);
                cache
                    .get_or_compute(&mut store, &id, SCALE_FIELD, &fingerprint, &snapshot, move || async move {
                        let label = classifier.classify(ctx, frame, root).await?;
                        if !SCALES.contains(&label.as_str()) {
                            tracing::warn!("Unknown shot scale {label:?} for {}", frame.display());
                        }
                        Ok::<_, Error>(Computed::from(Value::String(label)))
                    })
                    .await?;
            }

            store.flush()?;
        }

        ctx.report(cache.stats());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{OperatorParams, RunContext};
    use framesense_common::{Collection, CollectionAttributes};
    use tempfile::tempdir;

    /// Labels frames by their id without any container.
    struct ByFrameId;

    #[async_trait]
    impl FrameScaleClassifier for ByFrameId {
        fn method(&self) -> &'static str {
            "by-id"
        }

        async fn classify(
            &mut self,
            _ctx: &mut OperatorContext,
            frame: &Path,
            _collection_root: &Path,
        ) -> Result<String> {
            let id = paths::frame_id(frame).unwrap_or_default();
            Ok(SCALES[id.parse::<usize>().unwrap_or(0) % SCALES.len()].to_string())
        }
    }

    fn context(root: &Path, redo: bool) -> OperatorContext {
        let run = RunContext {
            collections: vec![Collection {
                id: "col1".to_string(),
                attributes: CollectionAttributes {
                    path: root.to_path_buf(),
                    annotations_path: None,
                },
            }],
            command_args: crate::runtime::CommandArgs {
                redo,
                ..Default::default()
            },
            ..Default::default()
        };
        OperatorContext::new("scale_frames_by_id", run, OperatorParams::default(), root.join("op"))
    }

    #[tokio::test]
    async fn test_scales_are_recorded_then_reused() {
        let dir = tempdir().unwrap();
        let shot = dir.path().join("video/clip/shots/001");
        std::fs::create_dir_all(&shot).unwrap();
        std::fs::write(shot.join("0001.jpg"), b"").unwrap();
        std::fs::write(shot.join("0002.jpg"), b"").unwrap();

        let mut operator = ScaleFrames::new(ByFrameId);
        let mut ctx = context(dir.path(), false);
        operator.apply(&mut ctx).await.unwrap();

        let store = RecordStore::open(shot.join(FRAMES_FILE)).unwrap();
        let record = store.get("0002", SCALE_FIELD).unwrap();
        assert_eq!(record.value, Value::from("MS"));
        assert_eq!(record.extra["method"], "by-id");
        let first_update = record.updated;

        // A second run reuses both records untouched.
        operator.apply(&mut ctx).await.unwrap();
        let store = RecordStore::open(shot.join(FRAMES_FILE)).unwrap();
        assert_eq!(store.get("0002", SCALE_FIELD).unwrap().updated, first_update);

        // Redo recomputes.
        let mut ctx = context(dir.path(), true);
        operator.apply(&mut ctx).await.unwrap();
        let store = RecordStore::open(shot.join(FRAMES_FILE)).unwrap();
        assert!(store.get("0002", SCALE_FIELD).unwrap().updated >= first_update);
    }
}
