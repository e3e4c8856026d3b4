use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

use crate::model::AnalyzerResult;

/// Render a colored terminal report of the finished analysis.
pub fn render(result: &AnalyzerResult, path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    let project_count = result.projects.len();
    let package_count = result.packages.len();
    let collected = result.collect_errors();
    let error_count: usize = collected.values().map(Vec::len).sum();

    if quiet {
        println!(
            "Projects: {}  Packages: {}  Errors: {}",
            project_count.to_string().cyan(),
            package_count.to_string().cyan(),
            if error_count > 0 {
                error_count.to_string().red()
            } else {
                error_count.to_string().green()
            },
        );
        return Ok(());
    }

    println!("\n {} v{}", "depscanr".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Scanned: {}", path.display());
    if !result.vcs.url.is_empty() {
        println!(
            " VCS: {} {} @ {}",
            result.vcs.vcs_type,
            result.vcs.url,
            short_revision(&result.vcs.revision)
        );
    }
    println!();

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48}  │", "SUMMARY".bold());
    println!(" │  {:<48}  │", format!("Projects : {}", project_count));
    println!(" │  {:<48}  │", format!("Packages : {}", package_count));
    println!(" │  {:<48}  │", format!("Errors   : {}", error_count));
    println!(" └────────────────────────────────────────────────────┘\n");

    // Projects overview
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Definition file").add_attribute(Attribute::Bold),
            Cell::new("Scopes").add_attribute(Attribute::Bold),
            Cell::new("Dependencies").add_attribute(Attribute::Bold),
        ]);
    for project in &result.projects {
        let scope_names: Vec<&str> = project.scopes.iter().map(|s| s.name.as_str()).collect();
        table.add_row(vec![
            Cell::new(project.id.to_string()),
            Cell::new(&project.definition_file_path),
            Cell::new(scope_names.join(", ")),
            Cell::new(project.collect_dependency_ids(false).len().to_string()),
        ]);
    }
    println!("{table}\n");

    if error_count > 0 {
        println!(" {} Resolution errors:\n", "[ERROR]".red().bold());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Identifier").add_attribute(Attribute::Bold),
                Cell::new("Errors").add_attribute(Attribute::Bold),
            ]);
        for (id, errors) in &collected {
            table.add_row(vec![Cell::new(id.to_string()), Cell::new(errors.join("\n"))]);
        }
        println!("{table}\n");
    }

    if verbose && package_count > 0 {
        println!(" {} Resolved packages:\n", "[PACKAGES]".green().bold());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Identifier").add_attribute(Attribute::Bold),
                Cell::new("Licenses").add_attribute(Attribute::Bold),
                Cell::new("Curations").add_attribute(Attribute::Bold),
            ]);
        for package in &result.packages {
            table.add_row(vec![
                Cell::new(package.id().to_string()),
                Cell::new(package.package.declared_licenses.join(", ")),
                Cell::new(package.curations.len().to_string()),
            ]);
        }
        println!("{table}\n");
    }

    Ok(())
}

fn short_revision(revision: &str) -> &str {
    if revision.is_empty() {
        return "unknown";
    }
    // HEAD may hold a symbolic ref rather than a hex hash, so cut on a char
    // boundary instead of byte-slicing.
    match revision.char_indices().nth(12) {
        Some((end, _)) => &revision[..end],
        None => revision,
    }
}
