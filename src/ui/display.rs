//! Display functions for bundles, images, tags and install plans

use console::Style;
use std::collections::BTreeMap;

use crate::descriptor::DescriptorKind;
use crate::image::ImageReference;
use crate::inspect::{ComponentSummary, InspectedBundle};
use crate::plan::InstallPlan;

macro_rules! display_opt_field {
    ($indent:expr, $label:expr, $value:expr) => {
        if let Some(v) = $value {
            println!("{}{} {}", $indent, Style::new().bold().apply_to($label), v);
        }
    };
}

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 { one } else { many }
}

/// Components grouped by kind, kinds in declaration order
fn group_by_kind(components: &[ComponentSummary]) -> BTreeMap<DescriptorKind, Vec<&ComponentSummary>> {
    let mut grouped: BTreeMap<DescriptorKind, Vec<&ComponentSummary>> = BTreeMap::new();
    for component in components {
        grouped.entry(component.kind).or_default().push(component);
    }
    grouped
}

/// Display a validated bundle
pub fn display_inspected(inspected: &InspectedBundle, digest: Option<&str>, show_resources: bool) {
    let summary = inspected.summary(digest);
    println!(
        "  {} {}",
        Style::new().bold().yellow().apply_to(summary.bundle.as_deref().unwrap_or("unnamed bundle")),
        Style::new().green().apply_to("valid")
    );
    println!(
        "    {} {}",
        Style::new().bold().apply_to("Descriptor version:"),
        summary.descriptor_version
    );
    display_opt_field!("    ", "Type:", inspected.descriptor.bundle_type.as_deref());
    display_opt_field!("    ", "Title:", inspected.descriptor.title.as_deref());
    display_opt_field!("    ", "Digest:", summary.digest.as_deref());

    let total = summary.components.len();
    println!(
        "    {} ({} {})",
        Style::new().bold().apply_to("Components:"),
        total,
        plural(total, "descriptor", "descriptors")
    );
    for (kind, components) in group_by_kind(&summary.components) {
        println!(
            "      {} ({})",
            Style::new().cyan().apply_to(kind.display_name()),
            components.len()
        );
        for component in components {
            println!(
                "        {} {}",
                component.identifier.as_deref().unwrap_or("-"),
                Style::new()
                    .dim()
                    .apply_to(format!("{} {}", component.path, component.descriptor_version))
            );
        }
    }

    let files = summary.resource_files.len();
    println!(
        "    {} ({} {}, {} {})",
        Style::new().bold().apply_to("Resources:"),
        files,
        plural(files, "file", "files"),
        summary.resource_folders.len(),
        plural(summary.resource_folders.len(), "folder", "folders")
    );
    if show_resources {
        for folder in &summary.resource_folders {
            println!("      {}/", Style::new().cyan().apply_to(folder));
        }
        for file in &summary.resource_files {
            println!("      {}", Style::new().dim().apply_to(file));
        }
    }
}

/// Display the parsed fields of an image reference
pub fn display_image(image: &ImageReference) {
    let label = |name: &str| Style::new().bold().apply_to(format!("{name}:")).to_string();
    println!("  {} {}", label("Transport"), image.transport());
    println!("  {} {}", label("Registry"), image.domain_registry());
    println!("  {} {}", label("Organization"), image.organization());
    println!("  {} {}", label("Repository"), image.repository());
    let version_label = if image.is_digest() { "Digest" } else { "Tag" };
    println!("  {} {}", label(version_label), image.tag_or_digest());
    if let Ok(url) = image.compose_url_without_transport() {
        println!("  {} {}", label("Address"), Style::new().cyan().apply_to(url));
    }
}

/// Display versions offered by a source
pub fn display_tags(url: &str, tags: &[String]) {
    if tags.is_empty() {
        println!(
            "  {} {}",
            Style::new().bold().apply_to(url),
            Style::new().dim().apply_to("(no tags)")
        );
        return;
    }
    println!(
        "  {} ({} {})",
        Style::new().bold().apply_to(url),
        tags.len(),
        plural(tags.len(), "tag", "tags")
    );
    for tag in tags {
        println!("    {tag}");
    }
}

/// Display per-category counts of a valid plan
pub fn display_plan(plan: &InstallPlan) {
    let total = plan.component_count();
    println!(
        "  {} ({} {})",
        Style::new().green().bold().apply_to("Install plan is valid"),
        total,
        plural(total, "component", "components")
    );
    for (category, items) in plan.categories() {
        if items.is_empty() {
            continue;
        }
        println!("    {} ({})", Style::new().cyan().apply_to(category), items.len());
        for (key, item) in items {
            let action = item.action.map_or("-", |a| a.as_str());
            println!(
                "      {} {}",
                key,
                Style::new().dim().apply_to(format!("{} -> {}", item.status, action))
            );
        }
    }
}
