//! Dependency specifications and requirement-expression parsing.
//!
//! A [`DependencySpec`] names one prerequisite, an optional version gate,
//! and its own declared dependencies. Specs are parsed from requirement
//! expressions (`"boost>=1.44"`, `"hdf5==1.8.9"`, `"cmake"`) or built
//! structurally; once resolved they are never mutated.

use crate::error::{CairnError, Result};

/// One declared prerequisite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Case-normalized (lowercase) dependency name.
    pub name: String,
    /// Requested version, if any. `None` means any version.
    pub requested_version: Option<String>,
    /// Exact-version match required, vs. minimum-version semantics.
    pub strict: bool,
    /// Dependencies declared by the requirement itself, in order.
    pub dependencies: Vec<DependencySpec>,
}

impl DependencySpec {
    /// A dependency at any version.
    pub fn any(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            requested_version: None,
            strict: false,
            dependencies: Vec::new(),
        }
    }

    /// A dependency with minimum-version semantics.
    pub fn at_least(name: &str, version: &str) -> Self {
        Self {
            requested_version: Some(version.to_string()),
            ..Self::any(name)
        }
    }

    /// A dependency requiring an exact version.
    pub fn exact(name: &str, version: &str) -> Self {
        Self {
            requested_version: Some(version.to_string()),
            strict: true,
            ..Self::any(name)
        }
    }

    /// Attach declared dependencies.
    pub fn with_dependencies(mut self, deps: Vec<DependencySpec>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Parse a requirement expression: `name`, `name>=version`, or
    /// `name==version`.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(CairnError::Config {
                message: "empty requirement expression".into(),
            });
        }
        for (op, strict) in [("==", true), (">=", false)] {
            if let Some((name, version)) = expr.split_once(op) {
                let (name, version) = (name.trim(), version.trim());
                if name.is_empty() || version.is_empty() {
                    return Err(CairnError::Config {
                        message: format!("malformed requirement expression '{expr}'"),
                    });
                }
                let spec = Self::any(name);
                return Ok(Self {
                    requested_version: Some(version.to_string()),
                    strict,
                    ..spec
                });
            }
        }
        if expr.contains(['<', '>', '=']) {
            return Err(CairnError::Config {
                message: format!("unsupported version constraint in '{expr}'"),
            });
        }
        Ok(Self::any(expr))
    }

    /// Environment key prefix for this dependency: uppercased name with
    /// non-alphanumerics mapped to `_` (`libfoo-bar` -> `LIBFOO_BAR`).
    pub fn env_prefix(&self) -> String {
        env_prefix(&self.name)
    }
}

/// Environment key prefix for a dependency name.
pub fn env_prefix(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
