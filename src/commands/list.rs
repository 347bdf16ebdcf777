//! `list` - resources in synthesis order

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::Context;
use crate::ui;

#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    logical_id: &'a str,
    #[serde(rename = "type")]
    type_name: &'static str,
    depends_on: &'a [String],
}

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let stack = super::load_stack(ctx)?;
    let document = stack.synthesize()?;

    if json {
        let entries: Vec<ListEntry<'_>> = document
            .resources()
            .map(|(id, entry)| ListEntry {
                logical_id: id,
                type_name: entry.kind.type_name(),
                depends_on: &entry.depends_on,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    ui::header(&format!(
        "{} ({})",
        stack.name(),
        ui::plural(document.len(), "resource")
    ));
    ui::kv("asset", &ctx.config.asset);
    println!();
    let width = document.resources().map(|(id, _)| id.len()).max().unwrap_or(0);
    for (id, entry) in document.resources() {
        let deps = if entry.depends_on.is_empty() {
            String::new()
        } else {
            format!(" <- {}", entry.depends_on.join(", "))
        };
        println!(
            "  {}  {}{}",
            format!("{id:<width$}").bold(),
            entry.kind.type_name().cyan(),
            deps.dimmed()
        );
    }
    Ok(())
}
