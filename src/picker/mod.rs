//! Pickers read a definition file and produce the test tree to run.
//!
//! YAML is the default format. Files ending in `.toml` are read as TOML.
pub mod toml;
pub mod yaml;

use crate::{
    definition::Definitions,
    errors::{Error, Result},
};
use std::path::Path;
use tracing::debug;

/// Load the definitions stored at `path`.
pub fn load(path: &Path) -> Result<Definitions> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        Error::Definition(format!(
            "{}: {}. testagg expects a test definition file.",
            path.display(),
            err
        ))
    })?;

    let is_toml = path.extension().map_or(false, |ext| ext == "toml");
    let parsed = if is_toml {
        toml::parse(&contents).map_err(|err| err.to_string())
    } else {
        yaml::parse(&contents).map_err(|err| err.to_string())
    };
    let table = parsed.map_err(|err| {
        Error::Definition(format!("Failed to parse {}: {}", path.display(), err))
    })?;

    let defs = Definitions::from_table(table)?;
    debug!(path = %path.display(), tests = defs.leaf_names().len(), "loaded definitions");
    Ok(defs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_format_by_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let yml = tmp.path().join("testagg.yml");
        std::fs::write(&yml, "a: cmd true\n").unwrap();
        let toml = tmp.path().join("testagg.toml");
        std::fs::write(&toml, "a = \"cmd true\"\n").unwrap();
        assert_eq!(load(&yml).unwrap(), load(&toml).unwrap());
    }

    #[test]
    fn missing_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(&tmp.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, Error::Definition(_)));
    }

    #[test]
    fn unparsable_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.yml");
        std::fs::write(&path, "a: [unclosed\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }

    #[test]
    fn unparsable_toml_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "a = [unclosed\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }
}
