//! CLI definitions using clap derive API
//!
//! This module is organized into submodules for each command's argument types:
//! - fetch: Fetch command arguments
//! - inspect: Inspect command arguments
//! - tags: Tags command arguments
//! - image: Image command arguments
//! - plan: Check-plan command arguments
//! - completions: Completions command arguments

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod completions;
pub mod fetch;
pub mod image;
pub mod inspect;
pub mod plan;
pub mod tags;

pub use completions::CompletionsArgs;
pub use fetch::FetchArgs;
pub use image::ImageArgs;
pub use inspect::InspectArgs;
pub use plan::CheckPlanArgs;
pub use tags::TagsArgs;

/// bundlegate - bundle acquisition and validation
///
/// Download bundles from git, npm or container registries and validate them before installation.
#[derive(Parser, Debug)]
#[command(
    name = "bundlegate",
    author,
    version,
    color = clap::ColorChoice::Auto,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Acquire, unpack and validate component bundles",
    long_about = "bundlegate downloads component bundles from git remotes, npm tarballs and \
                  container registries, unpacks them into scratch space and validates every \
                  descriptor against its versioned rules before anything gets installed.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  bundlegate fetch https://github.com/acme/bundle.git --tag v1.0.0   \x1b[90m# Download and validate\x1b[0m\n   \
                  bundlegate inspect ./bundle.tgz                                    \x1b[90m# Validate a local bundle\x1b[0m\n   \
                  bundlegate tags docker://docker.io/acme/bundle                     \x1b[90m# List available versions\x1b[0m\n   \
                  bundlegate image docker://quay.io/acme/bundle:1.2.3                \x1b[90m# Parse an image reference\x1b[0m\n   \
                  bundlegate check-plan plan.json                                    \x1b[90m# Check an install plan\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Configuration file (defaults to <config dir>/bundlegate/config.yaml)
    #[arg(long, short = 'c', global = true, env = "BUNDLEGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a bundle and validate it
    Fetch(FetchArgs),

    /// Validate a bundle directory or archive on local disk
    Inspect(InspectArgs),

    /// List the versions a bundle source offers
    Tags(TagsArgs),

    /// Parse and show a container image reference
    Image(ImageArgs),

    /// Check an install plan file
    #[command(name = "check-plan")]
    CheckPlan(CheckPlanArgs),

    /// Show version information
    #[command(hide = true)]
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}
