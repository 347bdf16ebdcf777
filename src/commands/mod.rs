//! Command implementations for the notifier-stack CLI

pub mod check;
pub mod list;
pub mod snapshot;
pub mod synth;

use anyhow::{Context as AnyhowContext, Result};
use declarative::Stack;
use log::{debug, info};

use crate::Context;

/// Declare the notifier stack from the resolved configuration
fn load_stack(ctx: &Context) -> Result<Stack> {
    let stack = crate::stack::notifier_stack(&ctx.config)
        .context("Could not declare the notifier stack")?;
    info!("Declared {} ({} resources)", stack.name(), stack.declarations().len());
    for decl in stack.declarations() {
        debug!("  {decl}");
    }
    Ok(stack)
}
