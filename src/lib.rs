//! testagg runs a tree of named tests and rolls up how many of them passed.
//!
//! Each test runs a command. A `cmd` test passes when the command exits with
//! status 0. A `ref` test compares the command's output against a reference
//! file `<name>.ref` holding the output it is expected to produce.
//!
//! ## Testing Model
//! Tests are defined in a `testagg.yml` file. Every entry maps a test name
//! to an instruction, or a group name to more tests:
//! ```yaml
//! .global:
//!   # (Optional) Directory holding the reference files.
//!   refdir: refs
//! hello: cmd echo hello
//! parser:
//!   # A plain group runs its tests inside the `parser/` directory.
//!   basic: ref ./parse basic.txt
//! tools:
//!   cd: "{build}/tools"
//!   alias:
//!     - tool: ./tool --verbose
//!   tests:
//!     - version: cmd {tool} --version
//!     - help: ref {tool} --help
//! ```
//! `{name}` is replaced with a binding. `{build}` is defined for every run
//! and holds the value of `CC`, or `build` when `CC` is unset. Groups may
//! define their own bindings with `alias`; they are visible to that group's
//! tests only.
//!
//! ## Running Tests
//! From the directory containing `testagg.yml`, run `testagg`. Each test
//! prints a verdict followed by whatever it printed, indented:
//! ```text
//! hello ok
//! basic FAILED
//!      *** Expected
//!      --- Actual
//!      ***************
//!      *** 1 ****
//!      ! 42
//!      --- 1 ----
//!      ! 41
//!      Command: ./parse basic.txt
//! 2 found / 1 passed / 1 failed
//! ```
//! Passing test names as arguments runs only those tests.
//!
//! ## Reference Files
//! The `--ref` flag decides what `ref` tests do with their reference file:
//!   - `cmp` (default): compare the output and show a context diff on mismatch.
//!   - `gen`: write the output into the reference file.
//!   - `dump`: print the reference file without running anything.
//!   - `none`: ignore the reference file and check the exit status only.
//!
//! ## Timeouts
//! Every test runs under a deadline, 20 seconds unless `--deftimeout` says
//! otherwise. A test that overruns it is reported as `TIMED OUT` and its
//! whole process group is killed.
pub mod bindings;
pub mod cli;
pub mod decoder;
pub mod definition;
pub mod diff;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod picker;
