//! Version command implementation

use std::path::PathBuf;

use console::Style;

use crate::commands::helpers::load_config;
use crate::config::PipelineConfig;
use crate::descriptor::DescriptorKind;
use crate::error::Result;
use crate::validation::ValidatorRegistry;

/// Print the build, the helper tools in use and the descriptor versions
/// this build validates
pub fn run(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let bold = Style::new().bold();

    println!("bundlegate {} ({} build)", env!("CARGO_PKG_VERSION"), build_profile());
    println!();
    println!("{}", bold.apply_to("Helper tools:"));
    for (role, tool) in tool_lines(&config) {
        println!("  {role:<9} {tool}");
    }
    println!();
    println!("{}", bold.apply_to("Descriptor versions:"));
    for (kind, versions) in descriptor_lines(&ValidatorRegistry::new()) {
        println!("  {kind:<17} {versions}");
    }

    Ok(())
}

fn tool_lines(config: &PipelineConfig) -> [(&'static str, &str); 3] {
    [
        ("git", config.tools.git.as_str()),
        ("registry", config.tools.registry.as_str()),
        ("tar", config.tools.tar.as_str()),
    ]
}

fn descriptor_lines(registry: &ValidatorRegistry) -> Vec<(&'static str, String)> {
    std::iter::once(DescriptorKind::Bundle)
        .chain(DescriptorKind::COMPONENT_KINDS)
        .map(|kind| {
            let versions = registry
                .accepted_versions(kind)
                .iter()
                .map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            (kind.display_name(), versions)
        })
        .collect()
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
