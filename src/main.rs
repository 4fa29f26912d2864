use testagg::{
    bindings::Bindings,
    cli, errors, executor, logging, picker,
};

use cli::Opts;
use errors::Error;
use structopt::StructOpt;
use tokio::runtime;

fn run() -> Result<i32, Error> {
    let opts = Opts::from_args();
    logging::init_cli();

    let defs = picker::load(&opts.testfile)?;
    let ctx = opts.context(&defs.options);
    let root = executor::Scope::new(std::env::current_dir()?, Bindings::from_env());

    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;

    // Run every selected test.
    let tally = runtime.block_on(executor::run(&defs, &ctx, root, std::io::stdout()))?;

    let passed = if ctx.dry_run {
        tally.failures == 0
    } else {
        tally.success()
    };
    Ok(if passed { 0 } else { 1 })
}

fn main() {
    std::process::exit(match run() {
        Err(err) => {
            println!("error: {}", err);
            1
        }
        Ok(code) => code,
    })
}
