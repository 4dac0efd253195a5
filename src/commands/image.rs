//! Image command implementation

use crate::cli::ImageArgs;
use crate::error::Result;
use crate::image::ImageReference;
use crate::ui::display;

const LABEL: &str = "image reference";

pub fn run(args: ImageArgs) -> Result<()> {
    let image = ImageReference::parse_valid(&args.reference, LABEL)?;
    display::display_image(&image);
    Ok(())
}
