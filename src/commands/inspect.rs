//! Inspect command implementation

use std::path::PathBuf;

use crate::cli::InspectArgs;
use crate::commands::helpers::{load_config, print_json};
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::ui::display;

pub fn run(config: Option<PathBuf>, args: InspectArgs) -> Result<()> {
    let pipeline = Pipeline::new(load_config(config.as_deref())?)?;
    let inspected = pipeline.inspect_local(&args.path)?;

    if args.json {
        print_json(&inspected.summary(None))
    } else {
        display::display_inspected(&inspected, None, args.resources);
        Ok(())
    }
}
