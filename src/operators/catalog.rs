use async_trait::async_trait;

use crate::error::Result;
use crate::runtime::{ArgumentKind, Operator, OperatorContext, OperatorRegistry};

pub const NAME: &str = "operators";

pub fn register(registry: &mut OperatorRegistry) {
    registry.register(NAME, "List all available operators", || Box::new(ListOperators));
}

/// Prints `name: description` for every registered operator.
pub struct ListOperators;

#[async_trait]
impl Operator for ListOperators {
    fn supported_arguments(&self) -> &'static [ArgumentKind] {
        &[]
    }

    fn uses_containers(&self) -> bool {
        false
    }

    fn needs_collections(&self) -> bool {
        false
    }

    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()> {
        for info in &ctx.run.catalog {
            println!("{}: {}", info.name, info.description);
        }
        Ok(())
    }
}
