//! Tags command implementation

use std::path::PathBuf;

use crate::cli::TagsArgs;
use crate::commands::helpers::load_config;
use crate::download::BundleDownloader;
use crate::error::Result;
use crate::progress::ProgressDisplay;
use crate::ui::display;

pub fn run(config: Option<PathBuf>, verbose: bool, args: TagsArgs) -> Result<()> {
    let downloader = BundleDownloader::new(load_config(config.as_deref())?)?;

    let progress = ProgressDisplay::new(format!("Listing tags of {}", args.url), !verbose);
    let tags = match downloader.list_tags(&args.url) {
        Ok(tags) => tags,
        Err(e) => {
            progress.abandon();
            return Err(e);
        }
    };
    progress.finish();

    display::display_tags(&args.url, &tags);
    Ok(())
}
