//! `check` - run the structural suite against a fresh synthesis

use anyhow::{Result, bail};
use std::io;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let template = super::load_stack(ctx)?.template()?;
    let suite = crate::stack::suite();
    let report = template.evaluate_all(&suite);

    if !ctx.quiet {
        ui::header("Structural checks");
    }
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) if ctx.quiet => {}
            Ok(()) => ui::success(&outcome.name),
            Err(failure) => {
                ui::failure(&mut io::stderr().lock(), &outcome.name, &failure.to_string())?;
            }
        }
    }

    if !report.is_success() {
        bail!("{report}");
    }
    if !ctx.quiet {
        println!();
        ui::success(&report.to_string());
    }
    Ok(())
}
