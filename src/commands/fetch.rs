//! Fetch command implementation
//!
//! Downloads the bundle, validates every descriptor, prints a summary and
//! optionally copies the unpacked tree out of scratch space before it is
//! removed.

use std::path::PathBuf;

use console::Style;
use tracing::debug;

use crate::cli::FetchArgs;
use crate::commands::helpers::{load_config, print_json};
use crate::common::fs::{CopyOptions, copy_dir_recursive};
use crate::download::BundleReference;
use crate::error::Result;
use crate::pipeline::{AcquiredBundle, Pipeline};
use crate::progress::ProgressDisplay;
use crate::ui::display;

pub fn run(config: Option<PathBuf>, verbose: bool, args: FetchArgs) -> Result<()> {
    let pipeline = Pipeline::new(load_config(config.as_deref())?)?;
    let reference = BundleReference::new(&args.url, &args.tag)?;

    let progress = ProgressDisplay::new(
        format!("Fetching {} ({})", reference, reference.strategy()),
        !verbose,
    );
    let acquired = match pipeline.acquire(&reference) {
        Ok(acquired) => acquired,
        Err(e) => {
            progress.abandon();
            return Err(e);
        }
    };
    progress.finish();

    let shown = report(&acquired, &args);
    let closed = acquired.close();
    shown?;
    closed
}

fn report(acquired: &AcquiredBundle, args: &FetchArgs) -> Result<()> {
    let digest = acquired.downloaded().map(|d| d.digest());

    if let (Some(output), Some(downloaded)) = (&args.output, acquired.downloaded()) {
        let copied = copy_dir_recursive(downloaded.path(), output, &CopyOptions::exclude_git())?;
        debug!(output = %output.display(), files = copied, "Copied bundle");
        if !args.json {
            println!(
                "{} {} files to {}",
                Style::new().green().bold().apply_to("Copied"),
                copied,
                output.display()
            );
        }
    }

    if args.json {
        print_json(&acquired.inspected().summary(digest))
    } else {
        display::display_inspected(acquired.inspected(), digest, false);
        Ok(())
    }
}
