use clap::Parser;

/// Arguments for the tags command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Git tags:\n    bundlegate tags https://github.com/acme/bundle.git\n\n\
                  Image tags:\n    bundlegate tags docker://docker.io/acme/bundle")]
pub struct TagsArgs {
    /// Bundle source URL
    pub url: String,
}
