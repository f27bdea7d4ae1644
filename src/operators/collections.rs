use async_trait::async_trait;

use framesense_common::paths;

use crate::error::Result;
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "collections";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "List all collections", || Box::new(ListCollections));
}

pub struct ListCollections;

#[async_trait]
impl Operator for ListCollections {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[ArgumentKind::Verbose]
    }

    fn uses_containers(&self) -> bool {
        false
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        for collection in ctx.collections() {
            let root = collection.root();
            if !root.is_dir() {
                println!("{} NOT FOUND", collection.id);
                continue;
            }

            let videos = paths::subdirectories(root);
            println!(
                "{} has {} videos under {}",
                collection.id,
                videos.len(),
                root.display()
            );
            if ctx.args().verbose {
                for video in &videos {
                    if let Some(name) = video.file_name() {
                        println!("  {}", name.to_string_lossy());
                    }
                }
            }
        }
        Ok(())
    }
}
