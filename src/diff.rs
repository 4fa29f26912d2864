//! Line-oriented comparison between a reference file and captured output.
use difference::{Changeset, Difference};

/// Compares expected lines against actual lines. An empty result means the
/// inputs are equal.
pub trait TextDiff: Send + Sync {
    fn diff(&self, expected: &[String], actual: &[String]) -> Vec<String>;
}

/// Context diff with `context` lines of unchanged text around each change.
#[derive(Debug, Clone, Copy)]
pub struct ContextDiff {
    pub context: usize,
}

impl Default for ContextDiff {
    fn default() -> Self {
        ContextDiff { context: 2 }
    }
}

/// Track the kind of an edit.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

impl Tag {
    fn prefix(self) -> &'static str {
        match self {
            Tag::Equal => "  ",
            Tag::Replace => "! ",
            Tag::Delete => "- ",
            Tag::Insert => "+ ",
        }
    }
}

/// An edit over `a[i1..i2]` and `b[j1..j2]`.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
struct Op(Tag, usize, usize, usize, usize);

fn line_count(chunk: &str) -> usize {
    chunk.split('\n').count()
}

/// Build an edit script from a line-level changeset. Runs of removals and
/// additions with nothing unchanged between them become a single replace.
fn opcodes(expected: &[String], actual: &[String]) -> Vec<Op> {
    let (n, m) = (expected.len(), actual.len());
    if n == 0 || m == 0 {
        return match (n, m) {
            (0, 0) => vec![],
            (0, _) => vec![Op(Tag::Insert, 0, 0, 0, m)],
            _ => vec![Op(Tag::Delete, 0, n, 0, 0)],
        };
    }

    let changes = Changeset::new(&expected.join("\n"), &actual.join("\n"), "\n");
    let mut script = Script::default();
    for change in &changes.diffs {
        match change {
            Difference::Same(chunk) => {
                script.flush();
                let len = line_count(chunk);
                let (i, j) = (script.i, script.j);
                script.ops.push(Op(Tag::Equal, i, i + len, j, j + len));
                script.i += len;
                script.j += len;
            }
            Difference::Rem(chunk) => script.rem += line_count(chunk),
            Difference::Add(chunk) => script.add += line_count(chunk),
        }
    }
    script.flush();
    script.ops
}

/// Edit script under construction along with pending removals/additions.
#[derive(Default)]
struct Script {
    ops: Vec<Op>,
    i: usize,
    j: usize,
    rem: usize,
    add: usize,
}

impl Script {
    fn flush(&mut self) {
        let tag = match (self.rem, self.add) {
            (0, 0) => return,
            (_, 0) => Tag::Delete,
            (0, _) => Tag::Insert,
            _ => Tag::Replace,
        };
        self.ops
            .push(Op(tag, self.i, self.i + self.rem, self.j, self.j + self.add));
        self.i += self.rem;
        self.j += self.add;
        self.rem = 0;
        self.add = 0;
    }
}

/// Split the edit script into hunks with at most `n` lines of context.
fn grouped(mut ops: Vec<Op>, n: usize) -> Vec<Vec<Op>> {
    if ops.is_empty() {
        ops.push(Op(Tag::Equal, 0, 1, 0, 1));
    }
    if let Some(Op(Tag::Equal, i1, i2, j1, j2)) = ops.first().copied() {
        ops[0] = Op(
            Tag::Equal,
            i1.max(i2.saturating_sub(n)),
            i2,
            j1.max(j2.saturating_sub(n)),
            j2,
        );
    }
    if let Some(Op(Tag::Equal, i1, i2, j1, j2)) = ops.last().copied() {
        let last = ops.len() - 1;
        ops[last] = Op(Tag::Equal, i1, i2.min(i1 + n), j1, j2.min(j1 + n));
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for Op(tag, mut i1, i2, mut j1, j2) in ops {
        if tag == Tag::Equal && i2 - i1 > 2 * n {
            group.push(Op(tag, i1, i2.min(i1 + n), j1, j2.min(j1 + n)));
            groups.push(std::mem::take(&mut group));
            i1 = i1.max(i2.saturating_sub(n));
            j1 = j1.max(j2.saturating_sub(n));
        }
        group.push(Op(tag, i1, i2, j1, j2));
    }
    if !group.is_empty() && !(group.len() == 1 && group[0].0 == Tag::Equal) {
        groups.push(group);
    }
    groups
}

fn range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length <= 1 {
        beginning.to_string()
    } else {
        format!("{},{}", beginning, beginning + length - 1)
    }
}

impl TextDiff for ContextDiff {
    fn diff(&self, expected: &[String], actual: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for group in grouped(opcodes(expected, actual), self.context) {
            if out.is_empty() {
                out.push("*** Expected".to_string());
                out.push("--- Actual".to_string());
            }
            let (first, last) = (group[0], group[group.len() - 1]);
            out.push("***************".to_string());

            out.push(format!("*** {} ****", range(first.1, last.2)));
            if group.iter().any(|op| matches!(op.0, Tag::Replace | Tag::Delete)) {
                for &Op(tag, i1, i2, _, _) in &group {
                    if tag != Tag::Insert {
                        out.extend(expected[i1..i2].iter().map(|l| format!("{}{}", tag.prefix(), l)));
                    }
                }
            }

            out.push(format!("--- {} ----", range(first.3, last.4)));
            if group.iter().any(|op| matches!(op.0, Tag::Replace | Tag::Insert)) {
                for &Op(tag, _, _, j1, j2) in &group {
                    if tag != Tag::Delete {
                        out.extend(actual[j1..j2].iter().map(|l| format!("{}{}", tag.prefix(), l)));
                    }
                }
            }
        }
        out
    }
}
