//! An executor is responsible for walking the test tree, running each test
//! and folding the results.

mod context;
pub mod reference;
pub mod results;
pub mod supervisor;
pub mod transcript;
mod walker;

pub use context::{Context, Scope};
pub use walker::Walker;

use crate::{definition::Definitions, errors::Result};
use results::Tally;
use std::io::Write;

/// Walk every test in `defs` starting from `root` and print a summary line.
/// The returned tally decides the exit status of the run.
pub async fn run<W: Write + Send>(
    defs: &Definitions,
    ctx: &Context,
    root: Scope,
    out: W,
) -> Result<Tally> {
    let mut walker = Walker::new(ctx, out);
    let tally = walker.walk_group("", &defs.root, &root).await?;
    if !ctx.dry_run {
        walker.emit(&tally.summary_str())?;
    }
    Ok(tally)
}
