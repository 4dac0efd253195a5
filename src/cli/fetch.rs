use clap::Parser;

/// Arguments for the fetch command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Fetch a git tag:\n    bundlegate fetch https://github.com/acme/bundle.git --tag v1.0.0\n\n\
                  Fetch an npm tarball:\n    bundlegate fetch https://registry.npmjs.org/acme-bundle/-/acme-bundle-1.0.0.tgz\n\n\
                  Fetch a container image:\n    bundlegate fetch docker://docker.io/acme/bundle --tag 1.0.0\n\n\
                  Keep the unpacked bundle:\n    bundlegate fetch docker://docker.io/acme/bundle:1.0.0 --output ./bundle")]
pub struct FetchArgs {
    /// Bundle source URL (git remote, npm tarball or docker:// image)
    pub url: String,

    /// Tag, branch or digest to fetch (defaults to the source's default)
    #[arg(long, short = 't', default_value = "")]
    pub tag: String,

    /// Copy the unpacked bundle to this directory
    #[arg(long, short = 'o')]
    pub output: Option<std::path::PathBuf>,

    /// Print the inspection result as JSON
    #[arg(long)]
    pub json: bool,
}
