//! `synth` - print or write the synthesized template

use anyhow::{Context as AnyhowContext, Result};
use log::info;
use std::fs;
use std::path::Path;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, output: Option<&Path>) -> Result<()> {
    let stack = super::load_stack(ctx)?;
    let document = stack.synthesize()?;
    let json = document.to_json()?;

    let Some(dir) = output else {
        print!("{json}");
        return Ok(());
    };

    fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;
    let path = dir.join(format!("{}.template.json", stack.name()));
    fs::write(&path, &json).with_context(|| format!("Could not write {}", path.display()))?;
    info!("Wrote {} bytes to {}", json.len(), path.display());

    if !ctx.quiet {
        ui::success(&format!(
            "Synthesized {} to {}",
            ui::plural(document.len(), "resource"),
            path.display()
        ));
        let missing = ctx.config.missing();
        if !missing.is_empty() {
            ui::warn(&format!("Empty function variables: {}", missing.join(", ")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use declarative::Document;

    #[test]
    fn test_writes_template_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            quiet: true,
            config: StackConfig::default(),
        };
        run(&ctx, Some(dir.path())).unwrap();

        let written = fs::read_to_string(dir.path().join("NotifierStack.template.json")).unwrap();
        assert!(written.ends_with('\n'));
        let document = Document::from_json(&written).unwrap();
        assert_eq!(document.len(), 7);
    }
}
