//! Path resolution against a procedure tree or a plain JSON tree.
//!
//! A path runs out of structure when it still has keys left but the node it
//! reached is not a nested mapping. That, or a missing key, resolves to
//! `None`.

use serde_json::Value;

use crate::tree::{Node, Procedure, ProcedureTree};

/// What a path addresses inside a [`ProcedureTree`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum Resolved<'a> {
    /// A (sub)tree of registrations.
    Tree(&'a ProcedureTree),
    /// A callable procedure.
    Procedure(&'a Procedure),
    /// Plain data, possibly nested inside a data object.
    Data(&'a Value),
}

/// Resolves `path` against `tree`.
///
/// The empty path resolves to `tree` itself.
pub fn resolve<'a>(tree: &'a ProcedureTree, path: &[String]) -> Option<Resolved<'a>> {
    let Some((key, rest)) = path.split_first() else {
        return Some(Resolved::Tree(tree));
    };
    match tree.get(key)? {
        Node::Tree(sub) => resolve(sub, rest),
        Node::Data(data) => resolve_value(data, rest).map(Resolved::Data),
        Node::Procedure(procedure) => rest.is_empty().then_some(Resolved::Procedure(procedure)),
    }
}

/// Resolves `path` against a JSON value, treating objects as nested mappings.
///
/// The empty path resolves to `value` itself, whatever it is.
pub fn resolve_value<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let Some((key, rest)) = path.split_first() else {
        return Some(value);
    };
    resolve_value(value.as_object()?.get(key)?, rest)
}
