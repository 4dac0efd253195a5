//! Container-registry strategy
//!
//! Steps run strictly in order: validate and qualify the image reference,
//! log in when the registry has credentials, export the image filesystem to
//! a tar file (retried), unpack it with `tar` under the shorter decompress
//! timeout, and check that the result has a root descriptor.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::{BundleReference, DownloadContext, captured_lines, outcome_failure, process_failure};
use crate::config::RegistryCredentials;
use crate::error::{Result, download_failed};
use crate::image::ImageReference;
use crate::process::{ProcessOutcome, ProcessSpec, kill_leaked_by_name};
use crate::reader::DESCRIPTOR_FILE;
use crate::retry::RetryExecutor;
use crate::temp::scratch_path_prefix;

/// Exported image filesystem, next to the bundle directory
const IMAGE_TAR: &str = "image.tar";

const IMAGE_LABEL: &str = "bundle image";

/// Image named by `reference`, with its version (when given) as tag or digest
pub fn qualified_image(reference: &BundleReference) -> Result<ImageReference> {
    let parsed = ImageReference::parse(reference.source_url());
    let image = if reference.version().is_empty() {
        parsed
    } else {
        parsed.with_tag_or_digest(reference.version())
    };
    image.validate_or_err(IMAGE_LABEL)?;
    Ok(image)
}

/// Executable name as it shows up in the process table
fn executable_name(tool: &str) -> &str {
    Path::new(tool)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(tool)
}

/// Kill registry-CLI and tar processes orphaned by an earlier aborted run
fn sweep_leaked_helpers(ctx: &DownloadContext<'_>) {
    let prefix = scratch_path_prefix();
    let grace = ctx.config.kill_grace_period();
    for tool in [&ctx.config.tools.registry, &ctx.config.tools.tar] {
        let killed = kill_leaked_by_name(executable_name(tool), Some(&prefix), grace);
        if killed > 0 {
            warn!(tool = %tool, killed, "Killed leaked helper processes");
        }
    }
}

fn registry_command(ctx: &DownloadContext<'_>) -> ProcessSpec {
    ProcessSpec::new(ctx.config.tools.registry.as_str()).capture_stdout()
}

/// `auth login` reading the password from stdin, never from argv
fn login_command(registry_tool: &str, domain: &str, credentials: &RegistryCredentials) -> ProcessSpec {
    ProcessSpec::new(registry_tool)
        .capture_stdout()
        .args(["auth", "login", domain])
        .args(["-u", credentials.username.as_str(), "--password-stdin"])
        .stdin_payload(credentials.password.as_str())
        .redacted()
}

/// Log in to the image's registry when credentials are configured for it
fn login(ctx: &DownloadContext<'_>, image: &ImageReference, label: &str) -> Result<()> {
    let Some(credentials) = ctx.credentials.lookup(image.domain_registry()) else {
        debug!(registry = image.domain_registry(), "No credentials configured, pulling anonymously");
        return Ok(());
    };

    let spec = login_command(&ctx.config.tools.registry, image.domain_registry(), credentials);
    let outcome = ctx
        .runner(ctx.config.download_timeout())
        .run(&spec)
        .map_err(|e| process_failure(label, &e))?;
    if !outcome.is_success() {
        return Err(outcome_failure(label, "registry login", &outcome));
    }
    info!(registry = image.domain_registry(), "Logged in to registry");
    Ok(())
}

fn export(ctx: &DownloadContext<'_>, address: &str, tar_path: &Path, label: &str) -> Result<()> {
    let runner = ctx.runner(ctx.config.download_timeout());
    let spec = registry_command(ctx)
        .args(["export", address])
        .arg(tar_path.to_string_lossy());

    let outcome = RetryExecutor::new(ctx.config.download_retries).execute(
        &spec,
        |spec| {
            if tar_path.exists() {
                let _ = fs::remove_file(tar_path);
            }
            runner.run(spec).map_err(|e| process_failure(label, &e))
        },
        ProcessOutcome::is_success,
    )?;
    if !outcome.is_success() {
        return Err(outcome_failure(label, "image export", &outcome));
    }
    Ok(())
}

fn untar(ctx: &DownloadContext<'_>, tar_path: &Path, label: &str) -> Result<()> {
    let spec = ProcessSpec::new(ctx.config.tools.tar.as_str())
        .arg("-xf")
        .arg(tar_path.to_string_lossy())
        .arg("-C")
        .arg(ctx.target.to_string_lossy())
        .capture_stdout();
    let outcome = ctx
        .runner(ctx.config.decompress_timeout())
        .run(&spec)
        .map_err(|e| process_failure(label, &e))?;
    if !outcome.is_success() {
        return Err(outcome_failure(label, "image unpack", &outcome));
    }
    Ok(())
}

/// Export the image and unpack it into the context target
pub(crate) fn download(ctx: &DownloadContext<'_>, reference: &BundleReference) -> Result<()> {
    let label = reference.to_string();
    let image = qualified_image(reference)?;
    let address = image.compose_url_without_transport()?;

    sweep_leaked_helpers(ctx);
    ctx.reset_target(true)?;

    login(ctx, &image, &label)?;

    let tar_path = ctx.work_dir.join(IMAGE_TAR);
    export(ctx, &address, &tar_path, &label)?;
    untar(ctx, &tar_path, &label)?;
    if let Err(e) = fs::remove_file(&tar_path) {
        debug!(path = %tar_path.display(), "Could not remove exported image: {}", e);
    }

    if !ctx.target.join(DESCRIPTOR_FILE).is_file() {
        return Err(download_failed(
            &label,
            format!("image {image} has no {DESCRIPTOR_FILE} at its root"),
        ));
    }

    info!(image = %image, "Unpacked bundle image");
    Ok(())
}

/// Tags of the image repository named by `url` (any tag in `url` is ignored)
pub(crate) fn list_tags(ctx: &DownloadContext<'_>, url: &str) -> Result<Vec<String>> {
    let image = ImageReference::parse(url);
    image.validate_repository_address(IMAGE_LABEL)?;
    let repository = image.compose_url_without_transport_without_tag()?;

    login(ctx, &image, url)?;

    let runner = ctx.runner(ctx.config.download_timeout());
    let spec = registry_command(ctx).args(["ls", repository.as_str()]);
    let outcome = RetryExecutor::new(ctx.config.download_retries).execute(
        &spec,
        |spec| runner.run(spec).map_err(|e| process_failure(url, &e)),
        ProcessOutcome::is_success,
    )?;
    if !outcome.is_success() {
        return Err(outcome_failure(url, "tag listing", &outcome));
    }

    let tags: Vec<String> = captured_lines(url, "tag listing", &outcome)?
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!(repository = %repository, count = tags.len(), "Listed image tags");
    Ok(tags)
}
