use clap::Parser;

/// Arguments for the image command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Parse a tagged reference:\n    bundlegate image docker://quay.io/centos7/nginx-116-centos7:1.2.3\n\n\
                  Parse a digest reference:\n    bundlegate image docker://docker.io/nginx@sha256:<64 hex digits>")]
pub struct ImageArgs {
    /// Image reference, e.g. docker://<registry>/<organization>/<repository>:<tag>
    pub reference: String,
}
