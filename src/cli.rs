use crate::{
    definition::Options,
    executor::{reference::RefOp, Context},
};
use std::{path::PathBuf, time::Duration};
use structopt::StructOpt;

/// Options for the CLI.
#[derive(StructOpt, Debug)]
#[structopt(name = "testagg", about = "Hierarchical test aggregator.")]
pub struct Opts {
    /// Run these tests only.
    #[structopt(name = "TESTS")]
    pub tests: Vec<String>,

    /// Test definition file.
    #[structopt(long, default_value = "testagg.yml", parse(from_os_str))]
    pub testfile: PathBuf,

    /// Reference file operation: cmp, gen, none or dump.
    #[structopt(long = "ref", default_value = "cmp")]
    pub refop: RefOp,

    /// Default timeout for each test in seconds.
    #[structopt(long, default_value = "20", parse(try_from_str = parse_timeout))]
    pub deftimeout: Duration,

    /// Show line numbers when printing output.
    #[structopt(short = "N", long)]
    pub line_numbers: bool,

    /// Print the commands for each test without running them.
    #[structopt(long)]
    pub dry_run: bool,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|err| format!("{}: {}", s, err))?;
    Duration::try_from_secs_f64(secs).map_err(|err| format!("{}: {}", s, err))
}

impl Opts {
    /// Build the execution context. `options` comes from the definition
    /// file; `-N` turns line numbers on regardless.
    pub fn context(&self, options: &Options) -> Context {
        let options = Options {
            line_numbers: options.line_numbers || self.line_numbers,
            refdir: options.refdir.clone(),
        };
        Context::new(self.refop, self.deftimeout, options)
            .with_selection(self.tests.iter().cloned())
            .with_dry_run(self.dry_run)
    }
}
