use clap::{CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;

use framesense::runtime::{CommandArgs, OperatorRegistry};

#[derive(Parser, Debug)]
#[command(name = "framesense")]
#[command(author, version, about = "Run operators over media collections")]
pub struct Cli {
    /// Operator to apply
    pub operator: String,

    /// Only process paths containing this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Recompute results that already exist
    #[arg(short, long)]
    pub redo: bool,

    /// Show what would be done without executing
    #[arg(short, long)]
    pub dry_run: bool,

    /// Operator specific parameters
    #[arg(short, long, allow_hyphen_values = true)]
    pub parameters: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the collections manifest (defaults to $FRAMESENSE_COLLECTIONS)
    #[arg(long)]
    pub collections: Option<PathBuf>,

    /// Log every container engine command
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse the process arguments, listing `registry` in the help text.
    pub fn parse_with(registry: &OperatorRegistry) -> Self {
        let matches = Self::command()
            .after_help(operator_listing(registry))
            .get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    pub fn command_args(&self) -> CommandArgs {
        CommandArgs {
            filter: self.filter.clone(),
            verbose: self.verbose,
            redo: self.redo,
            dry_run: self.dry_run,
            parameters: self.parameters.clone(),
        }
    }
}

fn operator_listing(registry: &OperatorRegistry) -> String {
    let operators = registry.list();
    let width = operators.iter().map(|o| o.name.len()).max().unwrap_or(0);
    let mut listing = String::from("Operators:\n");
    for op in operators {
        listing.push_str(&format!("  {:width$}  {}\n", op.name, op.description));
    }
    listing
}
