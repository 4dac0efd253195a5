//! bundlegate - bundle acquisition and validation
//!
//! Command line front end: download bundles, validate local ones, list
//! available versions, parse image references and check install plans.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bundlegate::cli::{Cli, Commands};
use bundlegate::commands;

/// Log to stderr; `RUST_LOG` wins, else `debug` with --verbose and `warn` without
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(cli.config, cli.verbose, args),
        Commands::Inspect(args) => commands::inspect::run(cli.config, args),
        Commands::Tags(args) => commands::tags::run(cli.config, cli.verbose, args),
        Commands::Image(args) => commands::image::run(args),
        Commands::CheckPlan(args) => commands::check_plan::run(args),
        Commands::Version => commands::version::run(cli.config),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}
