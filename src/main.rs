mod cli;

use framesense::config;
use framesense::runtime::{OperatorRegistry, OperatorRuntime};

use anyhow::Result;
use cli::Cli;

fn run(cli: &Cli, registry: OperatorRegistry) -> Result<()> {
    let mut config = config::load_config_or_default(cli.config.as_deref())?;
    config::apply_env_overrides(&mut config);

    let debug = cli.debug || config::debug_from_env();
    let manifest = cli.collections.clone().or_else(config::collections_from_env);

    let runtime = OperatorRuntime::new(registry, config, debug);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(runtime.run(&cli.operator, manifest.as_deref(), cli.command_args()))?;
    Ok(())
}

/// Print captured process output, then the error line.
fn report(err: &anyhow::Error) {
    if let Some(output) = err
        .downcast_ref::<framesense::Error>()
        .and_then(|e| e.diagnostics())
    {
        eprintln!("{}", output.trim_end());
    }
    eprintln!("ERROR: {err:#}");
}

fn main() {
    dotenvy::dotenv().ok();

    let registry = OperatorRegistry::builtin();
    let cli = Cli::parse_with(&registry);

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "framesense=debug,framesense_container=debug,framesense_common=debug".to_string()
        } else {
            "framesense=info,framesense_container=info,framesense_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli, registry) {
        Ok(()) => println!("done ({})", cli.operator),
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}
