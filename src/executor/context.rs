use super::reference::RefOp;
use crate::{
    bindings::Bindings,
    decoder,
    definition::{Group, Options},
    errors::{Error, Result},
};
use std::{collections::BTreeSet, io, path::PathBuf, time::Duration};
use tracing::debug;

/// An execution context holds everything that stays fixed while the test
/// tree is walked.
#[derive(Debug, Clone)]
pub struct Context {
    /// Names of the tests to run. Empty means every test.
    pub selected: BTreeSet<String>,
    /// Operation applied to `ref` tests.
    pub refop: RefOp,
    /// Deadline for each test.
    pub timeout: Duration,
    pub options: Options,
    /// Print what would run instead of running it.
    pub dry_run: bool,
}

impl Context {
    pub fn new(refop: RefOp, timeout: Duration, options: Options) -> Self {
        Context {
            selected: BTreeSet::new(),
            refop,
            timeout,
            options,
            dry_run: false,
        }
    }

    /// Restrict the run to tests with these names.
    pub fn with_selection<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns true if the test `name` should run.
    pub fn selects(&self, name: &str) -> bool {
        self.selected.is_empty() || self.selected.contains(name)
    }

    /// Returns true unless a selection is active and none of `names` is in
    /// it.
    pub fn selects_any<'n, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'n str>,
    {
        self.selected.is_empty() || names.into_iter().any(|name| self.selected.contains(name))
    }
}

/// Directory and bindings visible at one level of the test tree.
///
/// Every group gets its own copy, so nothing a group changes can leak into
/// its siblings or its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Directory tests in this scope run in.
    pub dir: PathBuf,
    pub bindings: Bindings,
}

impl Scope {
    pub fn new(dir: PathBuf, bindings: Bindings) -> Self {
        Scope { dir, bindings }
    }

    /// The scope of `group` nested inside this one. The group's aliases are
    /// bound first, so its directory may refer to them.
    pub fn enter(&self, group: &Group) -> Result<Scope> {
        let mut bindings = self.bindings.clone();
        for (name, raw) in &group.aliases {
            let value = decoder::translate(raw, &bindings)?;
            bindings.bind(name.as_str(), value);
        }

        let dir = match &group.dir {
            None => self.dir.clone(),
            Some(rel) => {
                let dir = self.dir.join(decoder::translate(rel, &bindings)?);
                let meta = std::fs::metadata(&dir).map_err(|source| Error::Directory {
                    path: dir.clone(),
                    source,
                })?;
                if !meta.is_dir() {
                    return Err(Error::Directory {
                        path: dir,
                        source: io::Error::new(io::ErrorKind::Other, "not a directory"),
                    });
                }
                dir
            }
        };
        debug!(dir = %dir.display(), bindings = bindings.len(), "entering scope");
        Ok(Scope { dir, bindings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(dir: Option<&str>, aliases: &[(&str, &str)]) -> Group {
        Group {
            dir: dir.map(String::from),
            aliases: aliases
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            children: Vec::new(),
        }
    }

    #[test]
    fn aliases_chain_and_do_not_touch_parent() {
        let mut bindings = Bindings::default();
        bindings.bind("build", "gcc");
        let parent = Scope::new(PathBuf::from("/"), bindings);
        let child = parent
            .enter(&group(None, &[("bin", "{build}/bin"), ("tool", "{bin}/t")]))
            .unwrap();
        assert_eq!(child.bindings.get("tool"), Some("gcc/bin/t"));
        assert_eq!(parent.bindings.get("bin"), None);
        assert_eq!(child.dir, parent.dir);
    }

    #[test]
    fn alias_with_unknown_variable_fails() {
        let parent = Scope::new(PathBuf::from("/"), Bindings::default());
        let err = parent.enter(&group(None, &[("x", "{nope}")])).unwrap_err();
        assert!(matches!(err, Error::Substitution(_)));
    }

    #[test]
    fn directory_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("file"), "").unwrap();
        let parent = Scope::new(tmp.path().to_path_buf(), Bindings::default());

        let child = parent.enter(&group(Some("sub"), &[])).unwrap();
        assert_eq!(child.dir, tmp.path().join("sub"));
        assert!(parent.enter(&group(Some("missing"), &[])).is_err());
        assert!(parent.enter(&group(Some("file"), &[])).is_err());
    }

    #[test]
    fn directory_may_use_bindings() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("gcc/tools")).unwrap();
        let mut bindings = Bindings::default();
        bindings.bind("build", "gcc");
        let parent = Scope::new(tmp.path().to_path_buf(), bindings);
        let child = parent
            .enter(&group(Some("{sub}"), &[("sub", "{build}/tools")]))
            .unwrap();
        assert_eq!(child.dir, tmp.path().join("gcc/tools"));
    }

    #[test]
    fn selection() {
        let ctx = Context::new(RefOp::Cmp, Duration::from_secs(1), Options::default());
        assert!(ctx.selects("anything"));
        assert!(ctx.selects_any(Vec::new()));
        let ctx = ctx.with_selection(vec!["a"]);
        assert!(ctx.selects("a"));
        assert!(!ctx.selects("b"));
        assert!(ctx.selects_any(vec!["b", "a"]));
        assert!(!ctx.selects_any(vec!["b", "c"]));
    }
}
