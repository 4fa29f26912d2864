use colored::*;

/// Aggregate code of a test that exceeded its deadline.
pub const TIMEOUT_CODE: i32 = 124;
/// Aggregate code of a test that could not be decoded or launched.
pub const ERROR_CODE: i32 = 127;
/// Aggregate code of any other failed classification.
pub const FAILURE_CODE: i32 = 1;

/// Track the classification of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// The test passed.
    Pass,
    /// The test failed. Contains the code folded into the aggregate status,
    /// never zero.
    Fail(i32),
    /// The instruction keyword is not one testagg knows.
    Invalid(String),
}

impl Status {
    /// Classify a process exit code: zero passes, anything else fails with
    /// that code.
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            Status::Pass
        } else {
            Status::Fail(code)
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Status::Pass)
    }

    /// Value OR-ed into the aggregate status of enclosing scopes.
    pub fn code(&self) -> i32 {
        match self {
            Status::Pass => 0,
            Status::Fail(code) => *code,
            Status::Invalid(_) => ERROR_CODE,
        }
    }

    /// Colorized verdict token printed after the test name.
    pub fn token(&self) -> String {
        match self {
            Status::Pass => "ok".green().to_string(),
            Status::Fail(_) => "FAILED".red().to_string(),
            Status::Invalid(kw) => {
                format!("Invalid instruction '{}'", kw).red().to_string()
            }
        }
    }
}

/// Counts accumulated while walking one scope of the test tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Number of tests executed.
    pub found: usize,
    /// Number of executed tests that did not pass.
    pub failures: usize,
    /// Bitwise OR of every classification code below this scope.
    pub aggregate: i32,
}

impl Tally {
    /// Tally of a single executed test.
    pub fn leaf(status: &Status) -> Self {
        Tally {
            found: 1,
            failures: usize::from(!status.passed()),
            aggregate: status.code(),
        }
    }

    /// Tally of a scope that could not be entered. Nothing ran, but the
    /// aggregate status records the failure.
    pub fn scope_failure() -> Self {
        Tally {
            found: 0,
            failures: 0,
            aggregate: FAILURE_CODE,
        }
    }

    pub fn merge(&mut self, other: Tally) {
        self.found += other.found;
        self.failures += other.failures;
        self.aggregate |= other.aggregate;
    }

    pub fn passed(&self) -> usize {
        self.found - self.failures
    }

    /// A run succeeds when something ran and nothing failed.
    pub fn success(&self) -> bool {
        self.found > 0 && self.failures == 0 && self.aggregate == 0
    }

    /// Summary line printed after the whole tree has been walked.
    pub fn summary_str(&self) -> String {
        if self.found == 0 {
            return "No tests found".red().to_string();
        }
        let failed = format!("{} failed", self.failures);
        format!(
            "{} found / {} / {}",
            self.found,
            format!("{} passed", self.passed()).green(),
            if self.failures > 0 {
                failed.red()
            } else {
                failed.dimmed()
            }
        )
    }
}
