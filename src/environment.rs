//! The shared configuration environment.
//!
//! An [`Environment`] is the mutable map every provider reads and writes
//! during a resolution run: discovered include directories, library lists,
//! program paths, version strings. It is loaded from the configuration
//! cache at run start, mutated throughout, and persisted at run end. It is
//! never rolled back on failure — partial progress survives to speed up
//! retries.
//!
//! Key naming follows the `<PREFIX>_INCLUDE_DIR` / `<PREFIX>_LIB_DIR` /
//! `<PREFIX>_LIBRARIES` convention consumed by the rest of the build tool.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single environment value.
///
/// `Absent` is a declared-but-undiscovered placeholder: providers seed it
/// via `declare_defaults` so downstream consumers never see undefined keys,
/// and it does not count as "set" for user-override detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Str(String),
    List(Vec<String>),
    Absent,
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Str(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Str(s)
    }
}

impl From<Vec<String>> for EnvValue {
    fn from(v: Vec<String>) -> Self {
        EnvValue::List(v)
    }
}

/// The shared configuration map.
///
/// Backed by a `BTreeMap` so serialization and iteration order are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    values: BTreeMap<String, EnvValue>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key unconditionally.
    pub fn set(&mut self, key: &str, value: impl Into<EnvValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Seed a key only when it is not already present. Used by
    /// `declare_defaults` so placeholders never clobber user overrides.
    pub fn set_default(&mut self, key: &str, value: impl Into<EnvValue>) {
        self.values
            .entry(key.to_string())
            .or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.values.get(key)
    }

    /// String value of a key, if set to one.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(EnvValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// List value of a key, if set to one.
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.values.get(key) {
            Some(EnvValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Whether a key holds a real value. `Absent` placeholders and missing
    /// keys both answer false, so this is the user-override test.
    pub fn is_set(&self, key: &str) -> bool {
        !matches!(self.values.get(key), None | Some(EnvValue::Absent))
    }

    /// Append a value to a list key, creating or promoting as needed,
    /// skipping duplicates.
    pub fn push_onto(&mut self, key: &str, value: &str) {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| EnvValue::List(Vec::new()));
        match entry {
            EnvValue::List(list) => {
                if !list.iter().any(|v| v == value) {
                    list.push(value.to_string());
                }
            }
            EnvValue::Str(s) => {
                let mut list = vec![s.clone()];
                if s != value {
                    list.push(value.to_string());
                }
                *entry = EnvValue::List(list);
            }
            EnvValue::Absent => {
                *entry = EnvValue::List(vec![value.to_string()]);
            }
        }
    }

    /// Merge another environment into this one. Real values win over
    /// placeholders; placeholders never overwrite real values.
    pub fn merge(&mut self, other: &Environment) {
        for (key, value) in &other.values {
            match value {
                EnvValue::Absent => self.set_default(key, EnvValue::Absent),
                _ => {
                    self.values.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EnvValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
