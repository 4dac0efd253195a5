use clap::Parser;
use std::path::PathBuf;

/// Arguments for the inspect command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Validate an unpacked bundle:\n    bundlegate inspect ./my-bundle\n\n\
                  Validate an npm tarball:\n    bundlegate inspect ./my-bundle-1.0.0.tgz\n\n\
                  List resource files too:\n    bundlegate inspect ./my-bundle.zip --resources")]
pub struct InspectArgs {
    /// Bundle directory, .tgz/.tar.gz or .zip archive
    pub path: PathBuf,

    /// List resource files and folders
    #[arg(long)]
    pub resources: bool,

    /// Print the inspection result as JSON
    #[arg(long)]
    pub json: bool,
}
