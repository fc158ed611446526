//! Key paths into a nested registration tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered sequence of keys. The empty path addresses the tree root.
///
/// On the wire a path is an array of strings: `["math", "add"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a dotted path such as `math.add`.
    ///
    /// The empty string parses to the root path. Empty segments (`a..b`) are
    /// kept as empty keys.
    pub fn parse_dotted(s: &str) -> Self {
        if s.is_empty() {
            return Self::root();
        }
        Self(s.split('.').map(str::to_owned).collect())
    }

    /// Returns the keys of this path.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of this path extended by `key`.
    #[must_use]
    pub fn join(&self, key: impl Into<String>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Self(keys)
    }

    /// Converts the path into its JSON array form.
    pub fn into_value(self) -> Value {
        Value::Array(self.0.into_iter().map(Value::String).collect())
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<Vec<String>> for Path {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Path {
    fn from(keys: [S; N]) -> Self {
        Self(keys.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl AsRef<[String]> for Path {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}
