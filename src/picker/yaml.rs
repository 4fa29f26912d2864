//! The default picker, reading `testagg.yml` style files.
use crate::definition::Raw;
use std::collections::BTreeMap;

/// Parse the top-level mapping of a YAML definition file.
pub fn parse(contents: &str) -> Result<BTreeMap<String, Raw>, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}
