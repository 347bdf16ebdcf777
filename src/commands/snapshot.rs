//! `diff` and `snapshot` - compare against, or update, a stored template

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{AssertionFailure, DiffSummary, PathChange, group_by_resource};
use log::info;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::ui;

/// Compare the current template with the snapshot at `path`
pub fn diff(ctx: &Context, path: &Path, text: bool) -> Result<()> {
    let stored = fs::read_to_string(path)
        .with_context(|| format!("Could not read snapshot {}", path.display()))?;
    let template = super::load_stack(ctx)?.template()?;
    info!("Comparing against {}", path.display());

    match template.match_snapshot(&stored) {
        Ok(()) => {
            if !ctx.quiet {
                ui::success(&format!("Template matches {}", path.display()));
            }
            Ok(())
        }
        Err(AssertionFailure::SnapshotMismatch { changes }) => {
            show_changes(&changes);
            if text {
                ui::section("Text diff");
                show_text_diff(&stored, &template.to_snapshot()?);
            }
            let summary = DiffSummary::from_changes(&changes);
            bail!(
                "Template differs from {}: {} added, {} removed, {} changed",
                path.display(),
                summary.additions,
                summary.removals,
                summary.modifications
            )
        }
        Err(AssertionFailure::SnapshotLayout) => {
            if text {
                show_text_diff(&stored, &template.to_snapshot()?);
            }
            bail!(
                "{} has the same content but a different layout; run `snapshot` to rewrite it",
                path.display()
            )
        }
        Err(other) => Err(other).with_context(|| format!("Could not compare with {}", path.display())),
    }
}

/// Write the current template to `path`
pub fn write(ctx: &Context, path: &Path) -> Result<()> {
    let template = super::load_stack(ctx)?.template()?;
    let json = template.to_snapshot()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    let previous = fs::read_to_string(path).ok();
    if previous.as_deref() == Some(json.as_str()) {
        if !ctx.quiet {
            ui::info(&format!("{} is up to date", path.display()));
        }
        return Ok(());
    }

    fs::write(path, &json).with_context(|| format!("Could not write {}", path.display()))?;
    if !ctx.quiet {
        let verb = if previous.is_some() { "Updated" } else { "Wrote" };
        ui::success(&format!("{verb} snapshot {}", path.display()));
    }
    Ok(())
}

fn show_changes(changes: &[PathChange]) {
    ui::header(&format!("Snapshot differs ({})", ui::plural(changes.len(), "change")));
    for (logical_id, group) in group_by_resource(changes) {
        if logical_id.is_empty() {
            ui::section("(template)");
        } else {
            ui::section(&logical_id);
        }
        for change in group {
            ui::change(change);
        }
    }
}

/// Line diff of stored vs current text, using the `similar` crate
fn show_text_diff(stored: &str, current: &str) {
    let diff = similar::TextDiff::from_lines(stored, current);
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => print!("    {}", format!("- {change}").red()),
            similar::ChangeTag::Insert => print!("    {}", format!("+ {change}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;

    fn ctx(config: StackConfig) -> Context {
        Context {
            quiet: true,
            config,
        }
    }

    #[test]
    fn test_written_snapshot_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots").join("NotifierStack.json");
        let ctx = ctx(StackConfig::default());

        write(&ctx, &path).unwrap();
        diff(&ctx, &path, false).unwrap();
        // Rewriting an identical snapshot is a no-op
        write(&ctx, &path).unwrap();
    }

    #[test]
    fn test_changed_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NotifierStack.json");
        write(&ctx(StackConfig::default()), &path).unwrap();

        let changed = ctx(StackConfig::from_lookup(|_| None, "dist/function.zip"));
        let err = diff(&changed, &path, false).unwrap_err();
        assert!(err.to_string().contains("0 added, 0 removed, 1 changed"));
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = diff(&ctx(StackConfig::default()), &dir.path().join("none.json"), false)
            .unwrap_err();
        assert!(err.to_string().contains("Could not read snapshot"));
    }

    #[test]
    fn test_invalid_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(diff(&ctx(StackConfig::default()), &path, false).is_err());
    }
}
