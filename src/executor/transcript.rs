//! Buffered output of a single test.
//!
//! Everything a test prints while it runs goes into its [Transcript]. Once
//! the test is classified the transcript is rendered under the verdict line,
//! indented (or numbered) so it reads as part of that test.
use super::results::Status;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transcript(String);

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line of text.
    pub fn line<S: AsRef<str>>(&mut self, text: S) {
        self.0.push_str(text.as_ref());
        self.0.push('\n');
    }

    /// Append a block of process output. Trailing whitespace is dropped and
    /// an empty block adds nothing.
    pub fn block(&mut self, text: &str) {
        let text = text.trim_end();
        if !text.is_empty() {
            self.line(text);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the verdict line for `name` followed by the buffered text.
    pub fn render(&self, name: &str, status: &Status, line_numbers: bool) -> String {
        let mut buf = format!("{} {}", name, status.token());
        let lines: Vec<&str> = self.0.lines().collect();
        let used = lines
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map_or(0, |last| last + 1);

        for (idx, line) in lines[..used].iter().enumerate() {
            let indent = if line_numbers {
                format!("{:>4}", idx + 1)
            } else {
                "    ".to_string()
            };
            buf.push('\n');
            buf.push_str(format!("{} {}", indent, line).trim_end());
        }
        buf
    }
}
