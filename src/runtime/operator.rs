//! The [`Operator`] trait defines one named batch job over the collections.

use async_trait::async_trait;
use std::fmt;

use super::context::OperatorContext;
use crate::error::Result;

/// A run-time flag an operator may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgumentKind {
    Filter,
    Verbose,
    Redo,
    DryRun,
    Parameters,
}

impl ArgumentKind {
    /// The command-line spelling of the flag.
    pub fn flag(&self) -> &'static str {
        match self {
            ArgumentKind::Filter => "--filter",
            ArgumentKind::Verbose => "--verbose",
            ArgumentKind::Redo => "--redo",
            ArgumentKind::DryRun => "--dry-run",
            ArgumentKind::Parameters => "--parameters",
        }
    }
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// A batch job applied to every item of the declared collections.
///
/// The runtime validates flags against [`Operator::supported_arguments`],
/// prepares containers when [`Operator::uses_containers`] says so, then calls
/// [`Operator::apply`] once.
#[async_trait]
pub trait Operator: Send {
    /// Flags this operator accepts. Anything else supplied is rejected.
    fn supported_arguments(&self) -> &'static [ArgumentKind];

    /// Whether the runtime must detect an engine, build the image, and manage
    /// a service around [`Operator::apply`].
    fn uses_containers(&self) -> bool;

    /// Whether a collections manifest is required.
    fn needs_collections(&self) -> bool {
        true
    }

    /// Do the work.
    async fn apply(&mut self, ctx: &mut OperatorContext) -> Result<()>;
}
