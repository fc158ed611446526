//! Procedure registration tree.
//!
//! The host registers its callable surface once, as a nested [`ProcedureTree`],
//! and never mutates it afterwards.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hostcall_proto::Sender;
use serde::Serialize;
use serde_json::{Map, Value};

/// Failure reported by a procedure. Only its message crosses the channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProcedureError {
    /// Human-readable failure text.
    message: String,
}

impl ProcedureError {
    /// Creates an error carrying `message`'s display text.
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    /// Returns the failure text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consumes the error, returning the failure text.
    pub fn into_message(self) -> String {
        self.message
    }
}

impl From<String> for ProcedureError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ProcedureError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A deferred procedure result: settles once, with a value or a failure.
pub type Deferred = BoxFuture<'static, Result<Value, ProcedureError>>;

/// What a procedure hands back when called.
#[non_exhaustive]
pub enum Outcome {
    /// The result is available now.
    Ready(Result<Value, ProcedureError>),
    /// The result will be available once the future settles.
    Deferred(Deferred),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Call metadata passed to every procedure after its positional arguments.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct InvocationContext {
    /// The raw request as received from the channel.
    pub request: Value,
    /// The client context that sent it.
    pub sender: Sender,
}

impl InvocationContext {
    /// Creates a context for `request` sent by `sender`.
    pub const fn new(request: Value, sender: Sender) -> Self {
        Self { request, sender }
    }
}

/// Signature shared by all registered procedures.
type ProcedureFn = dyn Fn(Vec<Value>, InvocationContext) -> Outcome + Send + Sync;

/// A callable leaf of the registration tree.
///
/// Cloning is cheap; clones share the same underlying function.
#[derive(Clone)]
pub struct Procedure(Arc<ProcedureFn>);

impl Procedure {
    /// Wraps a raw procedure that decides itself whether to defer.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>, InvocationContext) -> Outcome + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wraps a synchronous function. An `Err` is reported as a failure.
    pub fn sync<F, T, E>(f: F) -> Self
    where
        F: Fn(Vec<Value>, InvocationContext) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize + 'static,
        E: fmt::Display + 'static,
    {
        Self::new(move |args, ctx| {
            Outcome::Ready(f(args, ctx).map_err(ProcedureError::new).and_then(to_value))
        })
    }

    /// Wraps an asynchronous function. The returned future is the deferred
    /// result.
    pub fn deferred<F, Fut, T, E>(f: F) -> Self
    where
        F: Fn(Vec<Value>, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + 'static,
        E: fmt::Display + 'static,
    {
        Self::new(move |args, ctx| {
            let fut = f(args, ctx);
            Outcome::Deferred(
                async move { fut.await.map_err(ProcedureError::new).and_then(to_value) }.boxed(),
            )
        })
    }

    /// Calls the procedure.
    pub fn call(&self, args: Vec<Value>, ctx: InvocationContext) -> Outcome {
        (self.0)(args, ctx)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Procedure(..)")
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ProcedureError> {
    serde_json::to_value(value).map_err(ProcedureError::new)
}

/// One entry of a [`ProcedureTree`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Node {
    /// A nested mapping of further entries.
    Tree(ProcedureTree),
    /// A callable procedure.
    Procedure(Procedure),
    /// Plain data. JSON objects are walked like nested trees.
    Data(Value),
}

impl From<ProcedureTree> for Node {
    fn from(tree: ProcedureTree) -> Self {
        Self::Tree(tree)
    }
}

impl From<Procedure> for Node {
    fn from(procedure: Procedure) -> Self {
        Self::Procedure(procedure)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

/// Ordered mapping from keys to [`Node`]s.
///
/// Keys keep their insertion order; inserting an existing key replaces its
/// node in place.
///
/// # Example
///
/// ```
/// use hostcall::{Procedure, ProcedureTree};
///
/// let tree = ProcedureTree::new()
///     .with("ping", Procedure::sync(|_, _| Ok::<_, String>("pong")))
///     .with(
///         "math",
///         ProcedureTree::new().with(
///             "double",
///             Procedure::sync(|args, _| {
///                 let n = args.first().and_then(|v| v.as_i64()).ok_or("expected a number")?;
///                 Ok::<_, &str>(n * 2)
///             }),
///         ),
///     );
/// assert_eq!(tree.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProcedureTree {
    /// Entries in registration order.
    entries: Vec<(String, Node)>,
}

impl ProcedureTree {
    /// Creates an empty tree.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds `node` under `key`, returning the tree for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, node: impl Into<Node>) -> Self {
        self.insert(key, node);
        self
    }

    /// Adds `node` under `key`, replacing any previous entry for that key.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) {
        let key = key.into();
        let node = node.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = node,
            None => self.entries.push((key, node)),
        }
    }

    /// Looks up the node registered under `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find_map(|(k, node)| (k == key).then_some(node))
    }

    /// Iterates over entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, node)| (k.as_str(), node))
    }

    /// Number of direct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the tree as plain data.
    ///
    /// Nested trees become objects and data is copied as-is. Procedures
    /// cannot cross the channel and are left out.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .iter()
            .filter_map(|(key, node)| {
                let value = match node {
                    Node::Tree(sub) => sub.to_value(),
                    Node::Procedure(_) => return None,
                    Node::Data(data) => data.clone(),
                };
                Some((key.to_owned(), value))
            })
            .collect();
        Value::Object(map)
    }
}
