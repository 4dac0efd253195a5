//! Version-control strategy
//!
//! Shallow clone of one tag or branch through the `git` executable. The
//! child sees only the variables it needs for HTTPS and SSH transports and
//! never prompts for credentials.

use tracing::{debug, info};

use super::{BundleReference, DownloadContext, captured_lines, outcome_failure, process_failure};
use crate::error::Result;
use crate::process::ProcessSpec;

/// Parent variables a git child may see
const PASS_THROUGH_ENV: &[&str] = &["PATH", "HOME", "SSH_AUTH_SOCK", "GIT_SSH_COMMAND"];

fn git_command(ctx: &DownloadContext<'_>) -> ProcessSpec {
    ProcessSpec::new(ctx.config.tools.git.as_str())
        .pass_env(PASS_THROUGH_ENV.iter().copied())
        .env("GIT_TERMINAL_PROMPT", "0")
        .capture_stdout()
}

/// Clone `reference` into the context target, replacing any earlier attempt
pub(crate) fn download(ctx: &DownloadContext<'_>, reference: &BundleReference) -> Result<()> {
    let label = reference.to_string();
    ctx.reset_target(false)?;

    let mut spec = git_command(ctx).args(["clone", "--depth", "1"]);
    if !reference.version().is_empty() {
        spec = spec.args(["--branch", reference.version()]);
    }
    let spec = spec
        .arg(reference.source_url())
        .arg(ctx.target.to_string_lossy());

    let outcome = ctx
        .runner(ctx.config.download_timeout())
        .run(&spec)
        .map_err(|e| process_failure(&label, &e))?;
    if !outcome.is_success() {
        return Err(outcome_failure(&label, "git clone", &outcome));
    }

    info!(reference = %label, "Cloned repository");
    Ok(())
}

/// Tags advertised by the remote, without cloning
pub(crate) fn list_tags(ctx: &DownloadContext<'_>, url: &str) -> Result<Vec<String>> {
    let spec = git_command(ctx).args(["ls-remote", "--tags", "--refs", url]);
    let outcome = ctx
        .runner(ctx.config.download_timeout())
        .run(&spec)
        .map_err(|e| process_failure(url, &e))?;
    if !outcome.is_success() {
        return Err(outcome_failure(url, "git ls-remote", &outcome));
    }

    let tags = parse_ls_remote_tags(captured_lines(url, "git ls-remote", &outcome)?);
    debug!(url, count = tags.len(), "Listed remote tags");
    Ok(tags)
}

/// `<sha>\trefs/tags/<name>` lines to tag names
fn parse_ls_remote_tags(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|name| name.strip_prefix("refs/tags/"))
        .map(|name| name.trim_end_matches("^{}").to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
