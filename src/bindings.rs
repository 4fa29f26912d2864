//! Variable bindings visible to a scope of the test tree.
//!
//! Bindings are plain `name -> value` strings. A group that defines aliases
//! works on its own copy, so nothing it binds is ever visible to its
//! siblings.
use crate::errors::{Error, Result};
use regex::{Captures, Regex};
use std::{collections::BTreeMap, env, sync::OnceLock};

/// Name of the binding seeded from the `CC` environment variable.
pub const BUILD_VAR: &str = "build";

/// Build directory used when `CC` is unset or empty.
const DEFAULT_BUILD: &str = "build";

fn template() -> &'static Regex {
    static TEMPLATE: OnceLock<Regex> = OnceLock::new();
    TEMPLATE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("valid template regex")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<String, String>);

impl Bindings {
    /// Bindings a run starts with: `build` names the build directory, taken
    /// from `CC` when it is set.
    pub fn from_env() -> Self {
        let build = env::var("CC")
            .ok()
            .filter(|cc| !cc.is_empty())
            .unwrap_or_else(|| DEFAULT_BUILD.to_string());
        let mut bindings = Self::default();
        bindings.bind(BUILD_VAR, build);
        bindings
    }

    /// Bind `name` to `value`, shadowing any earlier binding of `name`.
    pub fn bind<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every `{name}` in `text` with its binding. `{{` and `}}`
    /// stand for literal braces.
    pub fn substitute(&self, text: &str) -> Result<String> {
        let mut failure = None;
        let out = template().replace_all(text, |caps: &Captures| {
            let whole = &caps[0];
            match (whole, caps.get(1)) {
                ("{{", _) => "{".to_string(),
                ("}}", _) => "}".to_string(),
                (_, Some(name)) => match self.get(name.as_str()) {
                    Some(value) => value.to_string(),
                    None => {
                        failure.get_or_insert_with(|| {
                            if name.as_str().is_empty() {
                                format!("empty variable reference in '{}'", text)
                            } else {
                                format!("unknown variable '{}'", name.as_str())
                            }
                        });
                        String::new()
                    }
                },
                (_, None) => {
                    failure.get_or_insert_with(|| {
                        format!("unbalanced '{}' in '{}'", whole, text)
                    });
                    String::new()
                }
            }
        });
        match failure {
            Some(msg) => Err(Error::Substitution(msg)),
            None => Ok(out.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        let mut b = Bindings::default();
        for (name, value) in pairs {
            b.bind(*name, *value);
        }
        b
    }

    #[test]
    fn substitutes_known_names() {
        let b = bindings(&[("build", "gcc"), ("bin", "app")]);
        assert_eq!(
            b.substitute("cmd {build}/{bin} --flag").unwrap(),
            "cmd gcc/app --flag"
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let b = bindings(&[("x", "1")]);
        assert_eq!(b.substitute("echo {{x}} {x}").unwrap(), "echo {x} 1");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let b = bindings(&[("x", "1")]);
        match b.substitute("echo {y}") {
            Err(Error::Substitution(msg)) => assert!(msg.contains("'y'")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stray_braces_are_errors() {
        let b = Bindings::default();
        assert!(b.substitute("echo {").is_err());
        assert!(b.substitute("echo }").is_err());
        assert!(b.substitute("echo {}").is_err());
    }

    #[test]
    fn later_binding_shadows_earlier() {
        let mut b = bindings(&[("x", "outer")]);
        let parent = b.clone();
        b.bind("x", "inner");
        assert_eq!(b.get("x"), Some("inner"));
        assert_eq!(parent.get("x"), Some("outer"));
    }
}
