//! Per-operation options and the visibility vocabulary shared by all backends.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

/// An immutable set of string options handed to backend write-type operations.
///
/// The facade keeps one as its defaults and builds a fresh merged copy for each call
/// with [`Config::extend`], so nothing leaks from one call into the next.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    options: BTreeMap<String, String>,
}

impl Config {
    /// Visibility applied to files written or copied.
    pub const VISIBILITY: &'static str = "visibility";
    /// Visibility applied to directories created along the way.
    pub const DIRECTORY_VISIBILITY: &'static str = "directory_visibility";

    pub fn new<I, K, V>(options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            options: options
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with<K: Into<String>, V: Into<String>>(&self, key: K, value: V) -> Self {
        let mut options = self.options.clone();
        options.insert(key.into(), value.into());
        Self { options }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Merges `overrides` over `self` into a new object; `overrides` wins on collision.
    pub fn extend(&self, overrides: &Config) -> Self {
        let mut options = self.options.clone();
        options.extend(
            overrides
                .options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self { options }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Portable visibility of a file or directory.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(anyhow!(
                "unknown visibility {:?}, expected \"public\" or \"private\"",
                other
            )),
        }
    }
}
