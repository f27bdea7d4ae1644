//! `transcode_clips_ffmpeg`: run the `command` parameter on every clip.
//!
//! The template uses `{input}` for the clip and `{output}` for the clip path
//! without extension, e.g. `ffmpeg -i {input} -c:v libvpx-vp9 {output}.webm`.
//! The output extension is the one the template ends with.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use framesense_common::paths;
use framesense_container::{Arg, Binding};

use crate::error::{Error, Result};
use crate::runtime::context::{RunOptions, DATA_DIR};
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "transcode_clips_ffmpeg";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "Convert a clip file to another video format", || {
        Box::new(TranscodeClipsFfmpeg)
    });
}

/// A parsed `command` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    tokens: Vec<String>,
    extension: String,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let template = template.trim();
        let extension = template
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && !ext.contains(|c: char| c.is_whitespace() || c == '/'))
            .ok_or_else(|| {
                Error::config(format!(
                    "'command' parameter must end with the output extension: {template:?}"
                ))
            })?;

        Ok(Self {
            tokens: template.split_whitespace().map(str::to_string).collect(),
            extension: extension.to_string(),
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Transcoded file of `clip`.
    pub fn output_path(&self, clip: &Path) -> PathBuf {
        clip.with_extension(&self.extension)
    }

    /// Template tokens with placeholders filled; filled tokens become paths.
    pub fn render(&self, clip: &Path) -> Vec<Arg> {
        let input = clip.to_string_lossy();
        let output_stem = clip.with_extension("");
        let output = output_stem.to_string_lossy();
        self.tokens
            .iter()
            .map(|token| {
                let filled = token.replace("{input}", &input).replace("{output}", &output);
                if filled == *token {
                    Arg::Text(filled)
                } else {
                    Arg::Path(PathBuf::from(filled))
                }
            })
            .collect()
    }
}

pub struct TranscodeClipsFfmpeg;

#[async_trait]
impl Operator for TranscodeClipsFfmpeg {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Filter, ArgumentKind::Redo, ArgumentKind::DryRun]
    }

    fn uses_containers(&self) -> bool {
        true
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        let template = CommandTemplate::parse(&ctx.params.require_text("command")?)?;
        let clips: Vec<_> = ctx
            .collections()
            .iter()
            .flat_map(|c| paths::clip_files(c.root()))
            .filter(|clip| ctx.args().is_selected(clip))
            .collect();

        for clip in clips {
            let output = template.output_path(&clip);
            if output == clip || (output.exists() && !ctx.args().redo) {
                continue;
            }
            tracing::info!("{}", output.display());
            if ctx.args().dry_run {
                continue;
            }

            let Some(clip_dir) = clip.parent() else {
                continue;
            };
            ctx.run_in_container(
                &template.render(&clip),
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

#[cfg(test)]
mod tests {
    use super::*;
    use framesense_container::translate;

    #[test]
    fn test_template_extension() {
        let template = CommandTemplate::parse("ffmpeg -i {input} -c:v libvpx-vp9 {output}.webm").unwrap();
        assert_eq!(template.extension(), "webm");
        assert_eq!(
            template.output_path(Path::new("/m/v/c/c.mp4")),
            PathBuf::from("/m/v/c/c.webm")
        );

        assert!(CommandTemplate::parse("ffmpeg -i {input} {output}").is_err());
        assert!(CommandTemplate::parse("").is_err());
    }

    #[test]
    fn test_render_translates_placeholders() {
        let template = CommandTemplate::parse("ffmpeg -i {input} -crf 30 {output}.webm").unwrap();
        let clip = Path::new("/m/v/00.01.00-30/00.01.00-30.mp4");
        let bindings = [Binding::new("/m/v/00.01.00-30", DATA_DIR)];

        assert_eq!(
            translate(&bindings, &template.render(clip)),
            ["ffmpeg", "-i", "/data/00.01.00-30.mp4", "-crf", "30", "/data/00.01.00-30.webm"]
        );
    }
}
