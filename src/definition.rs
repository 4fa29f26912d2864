//! The test definition tree.
//!
//! A definition file is a mapping from names to nodes. A node is either a
//! leaf, a single instruction string such as `cmd ./prog --check`, or a group
//! of further nodes. Groups come in two shapes:
//!
//! ```yaml
//! # A plain mapping runs its children inside the directory named by its key.
//! parser:
//!   basic: ref ./parser basic.txt
//!   empty: cmd ./parser --empty
//!
//! # A mapping with `cd`, `alias` or `tests` spells its scope out.
//! tools:
//!   cd: build/tools
//!   alias:
//!     - bin: "{build}/bin"
//!     - tool: "{bin}/tool"
//!   tests:
//!     - version: cmd {tool} --version
//!     - help: ref {tool} --help
//! ```
//!
//! The reserved `.global` entry at the top level holds [Options].
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::warn;

/// Key holding run-wide options.
pub const GLOBAL_KEY: &str = ".global";

const CD_KEY: &str = "cd";
const ALIAS_KEY: &str = "alias";
const TESTS_KEY: &str = "tests";

/// Parsed but untyped contents of a definition file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Raw {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<Raw>),
    Table(BTreeMap<String, Raw>),
}

impl Raw {
    fn kind(&self) -> &'static str {
        match self {
            Raw::Flag(_) => "a boolean",
            Raw::Number(_) => "a number",
            Raw::Text(_) => "a string",
            Raw::List(_) => "a list",
            Raw::Table(_) => "a mapping",
        }
    }

    /// Scalars rendered as text.
    fn scalar(self) -> Option<String> {
        match self {
            Raw::Flag(b) => Some(b.to_string()),
            Raw::Number(n) => Some(n.to_string()),
            Raw::Text(s) => Some(s),
            Raw::List(_) | Raw::Table(_) => None,
        }
    }
}

/// Options that hold for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Number output lines instead of indenting them.
    pub line_numbers: bool,
    /// Directory holding reference files, relative to each test's directory.
    pub refdir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Group(Group),
    Leaf(Leaf),
}

/// A single test instruction, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub raw: String,
}

/// A scope of tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    /// Directory to enter, relative to the enclosing scope. Decoded like an
    /// instruction, so it may refer to bindings.
    pub dir: Option<String>,
    /// Bindings introduced for this subtree, in definition order.
    pub aliases: Vec<(String, String)>,
    /// Children in the order they run.
    pub children: Vec<(String, Node)>,
}

/// A complete definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    pub options: Options,
    pub root: Group,
}

fn invalid(path: &str, msg: String) -> Error {
    Error::Definition(format!("{}: {}", path, msg))
}

impl Definitions {
    /// Build the typed tree from the top-level mapping of a definition file.
    pub fn from_table(mut table: BTreeMap<String, Raw>) -> Result<Self> {
        let options = match table.remove(GLOBAL_KEY) {
            Some(raw) => options(raw)?,
            None => Options::default(),
        };
        Ok(Definitions {
            options,
            root: Group {
                dir: None,
                aliases: Vec::new(),
                children: entries("", table)?,
            },
        })
    }

    /// Names of every leaf in the tree, in walk order.
    pub fn leaf_names(&self) -> Vec<&str> {
        self.root.leaf_names()
    }
}

impl Group {
    /// Names of every leaf below this group, in walk order.
    pub fn leaf_names(&self) -> Vec<&str> {
        fn collect<'a>(group: &'a Group, out: &mut Vec<&'a str>) {
            for (name, node) in &group.children {
                match node {
                    Node::Leaf(_) => out.push(name),
                    Node::Group(g) => collect(g, out),
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}

fn options(raw: Raw) -> Result<Options> {
    let table = match raw {
        Raw::Table(table) => table,
        other => {
            return Err(invalid(
                GLOBAL_KEY,
                format!("expected a mapping, found {}", other.kind()),
            ))
        }
    };
    let mut options = Options::default();
    for (key, value) in table {
        match (key.as_str(), value) {
            ("line_numbers", Raw::Flag(flag)) => options.line_numbers = flag,
            ("refdir", Raw::Text(dir)) => options.refdir = Some(PathBuf::from(dir)),
            ("line_numbers", other) | ("refdir", other) => {
                return Err(invalid(
                    &format!("{}.{}", GLOBAL_KEY, key),
                    format!("unexpected {}", other.kind()),
                ))
            }
            _ => warn!(key = %key, "ignoring unknown option in {}", GLOBAL_KEY),
        }
    }
    Ok(options)
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Convert the entries of a mapping; they run in key order.
fn entries(path: &str, table: BTreeMap<String, Raw>) -> Result<Vec<(String, Node)>> {
    table
        .into_iter()
        .map(|(name, raw)| {
            let node = node(&child_path(path, &name), &name, raw)?;
            Ok((name, node))
        })
        .collect()
}

fn node(path: &str, name: &str, raw: Raw) -> Result<Node> {
    match raw {
        Raw::Text(raw) => Ok(Node::Leaf(Leaf { raw })),
        Raw::Table(table) => group(path, name, table).map(Node::Group),
        other => Err(invalid(
            path,
            format!("expected an instruction or a group, found {}", other.kind()),
        )),
    }
}

fn group(path: &str, name: &str, mut table: BTreeMap<String, Raw>) -> Result<Group> {
    let structured = [CD_KEY, ALIAS_KEY, TESTS_KEY]
        .iter()
        .any(|key| table.contains_key(*key));
    if !structured {
        return Ok(Group {
            dir: Some(name.to_string()),
            aliases: Vec::new(),
            children: entries(path, table)?,
        });
    }

    let dir = match table.remove(CD_KEY) {
        None => None,
        Some(Raw::Text(dir)) => Some(dir),
        Some(other) => {
            return Err(invalid(
                &child_path(path, CD_KEY),
                format!("expected a directory, found {}", other.kind()),
            ))
        }
    };
    let aliases = match table.remove(ALIAS_KEY) {
        None => Vec::new(),
        Some(raw) => aliases(&child_path(path, ALIAS_KEY), raw)?,
    };
    let children = match table.remove(TESTS_KEY) {
        None => Vec::new(),
        Some(Raw::Table(tests)) => entries(path, tests)?,
        Some(Raw::List(items)) => {
            let mut children = Vec::new();
            for item in items {
                match item {
                    Raw::Table(tests) => children.extend(entries(path, tests)?),
                    other => {
                        return Err(invalid(
                            &child_path(path, TESTS_KEY),
                            format!("expected a mapping of tests, found {}", other.kind()),
                        ))
                    }
                }
            }
            children
        }
        Some(other) => {
            return Err(invalid(
                &child_path(path, TESTS_KEY),
                format!("expected tests, found {}", other.kind()),
            ))
        }
    };
    if let Some(key) = table.keys().next() {
        return Err(invalid(
            path,
            format!(
                "unexpected key '{}' next to {}/{}/{}",
                key, CD_KEY, ALIAS_KEY, TESTS_KEY
            ),
        ));
    }
    Ok(Group {
        dir,
        aliases,
        children,
    })
}

fn aliases(path: &str, raw: Raw) -> Result<Vec<(String, String)>> {
    let tables = match raw {
        Raw::List(items) => items,
        table @ Raw::Table(_) => vec![table],
        other => {
            return Err(invalid(
                path,
                format!("expected a list of bindings, found {}", other.kind()),
            ))
        }
    };
    let mut out = Vec::new();
    for item in tables {
        let table = match item {
            Raw::Table(table) => table,
            other => {
                return Err(invalid(
                    path,
                    format!("expected `name: value`, found {}", other.kind()),
                ))
            }
        };
        for (name, value) in table {
            let kind = value.kind();
            let value = value.scalar().ok_or_else(|| {
                invalid(
                    &child_path(path, &name),
                    format!("expected a value, found {}", kind),
                )
            })?;
            out.push((name, value));
        }
    }
    Ok(out)
}
