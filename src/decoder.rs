//! Turns a raw leaf definition into an instruction and its argument vector.
//!
//! Decoding happens in three passes: backslash escapes are decoded, `{name}`
//! references are substituted, and the result is split into words with
//! shell quoting rules.
use crate::bindings::Bindings;
use crate::errors::{Error, Result};
use std::fmt;

/// Instruction keyword of a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Run a process; success is exit code 0.
    Cmd,
    /// Run a process and check it against its reference file.
    Ref,
    /// Anything else.
    Unknown(String),
}

impl From<&str> for Kind {
    fn from(word: &str) -> Self {
        match word {
            "cmd" => Kind::Cmd,
            "ref" => Kind::Ref,
            other => Kind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kind::Cmd => write!(f, "cmd"),
            Kind::Ref => write!(f, "ref"),
            Kind::Unknown(word) => write!(f, "{}", word),
        }
    }
}

/// A decoded leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: Kind,
    pub argv: Vec<String>,
}

/// Decode escapes in `raw` and substitute `bindings` into it.
pub fn translate(raw: &str, bindings: &Bindings) -> Result<String> {
    bindings.substitute(&unescape(raw))
}

/// Translate and split `raw` into an [Instruction].
pub fn decode(raw: &str, bindings: &Bindings) -> Result<Instruction> {
    let (kind, argv) = split(&translate(raw, bindings)?)?;
    Ok(Instruction {
        kind: Kind::from(kind.as_str()),
        argv,
    })
}

/// Split a decoded string into the instruction keyword and its arguments.
pub fn split(decoded: &str) -> Result<(String, Vec<String>)> {
    let mut words = shell_words(decoded)?.into_iter();
    match words.next() {
        Some(kind) => Ok((kind, words.collect())),
        None => Err(Error::MalformedInstruction(format!(
            "'{}' contains no instruction",
            decoded
        ))),
    }
}

/// Decode backslash escapes. Unknown escapes are left untouched.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            None => out.push('\\'),
            Some(e) => {
                let simple = match e {
                    '\\' => Some('\\'),
                    '\'' => Some('\''),
                    '"' => Some('"'),
                    'n' => Some('\n'),
                    't' => Some('\t'),
                    'r' => Some('\r'),
                    'a' => Some('\x07'),
                    'b' => Some('\x08'),
                    'f' => Some('\x0c'),
                    'v' => Some('\x0b'),
                    _ => None,
                };
                if let Some(decoded) = simple {
                    chars.next();
                    out.push(decoded);
                } else if e == 'x' {
                    chars.next();
                    let hex: String = chars.clone().take(2).collect();
                    match u8::from_str_radix(&hex, 16) {
                        Ok(byte) if hex.len() == 2 => {
                            chars.nth(1);
                            out.push(char::from(byte));
                        }
                        _ => out.push_str("\\x"),
                    }
                } else if e.is_digit(8) {
                    let mut value = 0u32;
                    let mut digits = 0;
                    while digits < 3 {
                        match chars.peek().and_then(|d| d.to_digit(8)) {
                            Some(d) => {
                                value = value * 8 + d;
                                digits += 1;
                                chars.next();
                            }
                            None => break,
                        }
                    }
                    out.push(char::from((value & 0xff) as u8));
                } else {
                    out.push('\\');
                }
            }
        }
    }
    out
}

/// Split `text` into words following POSIX shell quoting.
fn shell_words(text: &str) -> Result<Vec<String>> {
    let unterminated = |what: &str| {
        Error::MalformedInstruction(format!("unterminated {} in '{}'", what, text))
    };

    let mut words = Vec::new();
    let mut word = String::new();
    // Quoting can produce an empty word, so track word presence separately.
    let mut in_word = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(unterminated("single quote")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => word.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(unterminated("double quote")),
                        },
                        Some(c) => word.push(c),
                        None => return Err(unterminated("double quote")),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(c) => {
                    in_word = true;
                    word.push(c);
                }
                None => return Err(unterminated("escape")),
            },
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}
