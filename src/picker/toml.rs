//! Picker for definition files written in TOML.
//!
//! The layout is the same as for YAML; the run-wide options table has to be
//! quoted:
//! ```toml
//! [".global"]
//! line_numbers = true
//!
//! [parser]
//! basic = "ref ./parser basic.txt"
//! ```
use crate::definition::Raw;
use std::collections::BTreeMap;

/// Parse the top-level table of a TOML definition file.
pub fn parse(contents: &str) -> Result<BTreeMap<String, Raw>, toml::de::Error> {
    toml::from_str(contents)
}
