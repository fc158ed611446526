//! The catalog: a mirror of the procedure tree with names instead of
//! procedures.
//!
//! A client learns what it can call from the catalog's shape: every nested
//! mapping of the registration tree appears as an object, and every leaf
//! appears as the string equal to its own key.

use hostcall_proto::Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resolve::resolve_value;
use crate::tree::{Node, ProcedureTree};

/// Shape of a [`ProcedureTree`], safe to send to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog(Value);

impl Catalog {
    /// Builds the catalog of `tree`, preserving key order.
    pub fn build(tree: &ProcedureTree) -> Self {
        Self(Value::Object(mirror_tree(tree)))
    }

    /// Wraps a catalog received from a host.
    pub const fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Returns the catalog as a JSON tree.
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the catalog, returning its JSON tree.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns `true` if `path` names a leaf of the catalog.
    pub fn contains(&self, path: &Path) -> bool {
        resolve_value(&self.0, path.segments()).is_some_and(Value::is_string)
    }

    /// Lists the path of every leaf, in key order.
    pub fn paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        collect_paths(&self.0, &Path::root(), &mut out);
        out
    }
}

fn mirror_tree(tree: &ProcedureTree) -> Map<String, Value> {
    tree.iter()
        .map(|(key, node)| {
            let entry = match node {
                Node::Tree(sub) => Value::Object(mirror_tree(sub)),
                Node::Data(Value::Object(map)) => Value::Object(mirror_map(map)),
                Node::Procedure(_) | Node::Data(_) => Value::String(key.to_owned()),
            };
            (key.to_owned(), entry)
        })
        .collect()
}

fn mirror_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let entry = match value {
                Value::Object(inner) => Value::Object(mirror_map(inner)),
                _ => Value::String(key.clone()),
            };
            (key.clone(), entry)
        })
        .collect()
}

fn collect_paths(value: &Value, prefix: &Path, out: &mut Vec<Path>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_paths(child, &prefix.join(key.as_str()), out);
            }
        }
        Value::String(_) if !prefix.is_root() => out.push(prefix.clone()),
        _ => {}
    }
}
