use super::{
    context::{Context, Scope},
    reference::{self, reference_path},
    results::{Status, Tally, ERROR_CODE, FAILURE_CODE},
    transcript::Transcript,
};
use crate::{
    decoder::{self, Instruction, Kind},
    definition::{Group, Leaf, Node},
    diff::{ContextDiff, TextDiff},
    errors::Result,
};
use colored::*;
use futures::future::{BoxFuture, FutureExt};
use std::io::Write;
use tracing::debug;

/// Walks a test tree one test at a time and writes a report to `out`.
pub struct Walker<'a, W> {
    ctx: &'a Context,
    out: W,
    differ: Box<dyn TextDiff>,
}

impl<'a, W: Write + Send> Walker<'a, W> {
    pub fn new(ctx: &'a Context, out: W) -> Self {
        Walker {
            ctx,
            out,
            differ: Box::new(ContextDiff::default()),
        }
    }

    /// Use `differ` to compare output against reference files.
    pub fn with_differ(mut self, differ: Box<dyn TextDiff>) -> Self {
        self.differ = differ;
        self
    }

    /// Consume the walker and return its output sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write a line to the report and flush it so progress is visible.
    pub fn emit(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }

    /// Walk `group`, named `name`, nested in `scope`. Only failures to write
    /// the report are returned as errors; everything else is counted.
    pub fn walk_group<'s>(
        &'s mut self,
        name: &'s str,
        group: &'s Group,
        scope: &'s Scope,
    ) -> BoxFuture<'s, Result<Tally>> {
        async move {
            let inner = match scope.enter(group) {
                Ok(inner) => inner,
                Err(err) if !self.ctx.selects_any(group.leaf_names()) => {
                    debug!(group = name, %err, "skipping unselected scope");
                    return Ok(Tally::default());
                }
                Err(err) => {
                    let mut log = Transcript::new();
                    log.line(err.to_string());
                    let line_numbers = self.ctx.options.line_numbers;
                    self.emit(&log.render(name, &Status::Fail(FAILURE_CODE), line_numbers))?;
                    return Ok(Tally::scope_failure());
                }
            };

            let mut tally = Tally::default();
            for (child, node) in &group.children {
                let sub = match node {
                    Node::Group(g) => self.walk_group(child, g, &inner).await?,
                    Node::Leaf(leaf) => self.run_leaf(child, leaf, &inner).await?,
                };
                tally.merge(sub);
            }
            Ok(tally)
        }
        .boxed()
    }

    /// Run a single test if it is selected.
    async fn run_leaf(&mut self, name: &str, leaf: &Leaf, scope: &Scope) -> Result<Tally> {
        if !self.ctx.selects(name) {
            return Ok(Tally::default());
        }

        let mut log = Transcript::new();
        let status = match decoder::decode(&leaf.raw, &scope.bindings) {
            Err(err) => {
                log.line(err.to_string());
                Status::Fail(ERROR_CODE)
            }
            Ok(Instruction { kind: Kind::Unknown(kw), .. }) => Status::Invalid(kw),
            Ok(inst) if self.ctx.dry_run => return self.describe(name, &inst, scope),
            Ok(Instruction { kind: Kind::Cmd, argv }) => {
                debug!(test = name, ?argv, "cmd");
                reference::command(&argv, &scope.dir, self.ctx.timeout, &mut log).await
            }
            Ok(Instruction { kind: Kind::Ref, argv }) => {
                let path = reference_path(name, self.ctx.options.refdir.as_deref(), &scope.dir);
                debug!(test = name, ?argv, refop = %self.ctx.refop, "ref");
                reference::check(
                    &argv,
                    &scope.dir,
                    &path,
                    self.ctx.refop,
                    self.ctx.timeout,
                    self.differ.as_ref(),
                    &mut log,
                )
                .await
            }
        };

        self.emit(&log.render(name, &status, self.ctx.options.line_numbers))?;
        Ok(Tally::leaf(&status))
    }

    /// Print what a test would run.
    fn describe(&mut self, name: &str, inst: &Instruction, scope: &Scope) -> Result<Tally> {
        self.emit(&format!(
            "{}{}{}\n  cd {} && {}",
            name.blue(),
            ":".blue(),
            inst.kind.to_string().blue(),
            scope.dir.display(),
            inst.argv.join(" ")
        ))?;
        Ok(Tally::leaf(&Status::Pass))
    }
}
