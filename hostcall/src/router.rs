//! The host entry point: one call per inbound channel message.
//!
//! Messages whose `handler` is not [`PROTOCOL_TAG`] belong to someone else
//! and go to the custom handler, if any. Protocol messages are routed by
//! [`RequestKind`]: catalog queries are answered from the catalog built at
//! construction, invocations go through [`dispatch`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use hostcall_proto::{PROTOCOL_TAG, Reply, RequestKind, Sender};
use serde_json::Value;
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::dispatch::{DISPATCH_TARGET, PendingReply, dispatch};
use crate::logger::{LoggingOptions, RequestLogger, TracingLogger};
use crate::tree::ProcedureTree;

/// Handler for messages that do not carry the protocol tag.
pub type CustomHandler = Arc<dyn Fn(&Value, &Sender) -> Response + Send + Sync>;

/// What the channel should do after a message was handled.
#[non_exhaustive]
pub enum Response {
    /// A protocol reply follows once this settles. Keep the channel open.
    Reply(PendingReply),
    /// A custom reply follows once this settles. Keep the channel open.
    Deferred(BoxFuture<'static, Value>),
    /// Handled synchronously; no reply will be sent.
    Value(Value),
    /// Not handled; no reply will be sent.
    Ignored,
}

impl Response {
    /// Wraps a future whose output is sent as the reply.
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        Self::Deferred(fut.boxed())
    }

    /// Returns `true` if a reply will follow, i.e. the channel must stay
    /// open.
    pub const fn keeps_channel_open(&self) -> bool {
        matches!(self, Self::Reply(_) | Self::Deferred(_))
    }

    /// Waits for the reply body, if one will be sent.
    pub async fn settle(self) -> Option<Value> {
        match self {
            Self::Reply(pending) => Some(pending.await.into_value()),
            Self::Deferred(pending) => Some(pending.await),
            Self::Value(_) | Self::Ignored => None,
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(_) => f.write_str("Reply(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Ignored => f.write_str("Ignored"),
        }
    }
}

/// Shared, immutable router state.
struct Inner {
    /// Registered procedures.
    tree: ProcedureTree,
    /// Catalog of `tree`, built once.
    catalog: Catalog,
    /// Fallback for foreign messages.
    custom_handler: Option<CustomHandler>,
    /// Receives every invocation request.
    logger: Arc<dyn RequestLogger>,
}

/// Routes channel messages to the catalog, the dispatcher, or the custom
/// handler.
///
/// Cloning is cheap; clones share the same tree and catalog.
///
/// # Example
///
/// ```
/// use futures_util::FutureExt;
/// use hostcall::{Procedure, ProcedureTree, Router};
/// use hostcall_proto::{Request, Sender};
/// use serde_json::json;
///
/// let tree = ProcedureTree::new().with("ping", Procedure::sync(|_, _| Ok::<_, String>("pong")));
/// let router = Router::new(tree);
///
/// let response = router.handle(&Request::invoke(["ping"], vec![]).into_value(), &Sender::default());
/// assert!(response.keeps_channel_open());
/// assert_eq!(response.settle().now_or_never().flatten(), Some(json!({ "result": "pong" })));
/// ```
#[derive(Clone)]
pub struct Router {
    /// Shared state.
    inner: Arc<Inner>,
}

impl Router {
    /// Starts configuring a router over `tree`.
    pub fn builder(tree: ProcedureTree) -> RouterBuilder {
        RouterBuilder::new(tree)
    }

    /// Creates a router with default options.
    pub fn new(tree: ProcedureTree) -> Self {
        Self::builder(tree).build()
    }

    /// Returns the catalog served to clients.
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Returns the registered procedures.
    pub fn tree(&self) -> &ProcedureTree {
        &self.inner.tree
    }

    /// Handles one inbound message from `sender`.
    pub fn handle(&self, request: &Value, sender: &Sender) -> Response {
        if request.get("handler").and_then(Value::as_str) != Some(PROTOCOL_TAG) {
            return match &self.inner.custom_handler {
                Some(handler) => handler(request, sender),
                None => Response::Ignored,
            };
        }

        match request
            .get("type")
            .and_then(Value::as_str)
            .and_then(RequestKind::parse)
        {
            Some(RequestKind::GetFunctionNames) => {
                trace!(target: DISPATCH_TARGET, "serving catalog");
                let catalog = self.inner.catalog.as_value().clone();
                Response::Reply(future::ready(Reply::Result(catalog)).boxed())
            }
            Some(RequestKind::InvokeFunction) => {
                self.inner.logger.log_request(request);
                dispatch(&self.inner.tree, request, sender).map_or(Response::Ignored, Response::Reply)
            }
            _ => {
                debug!(target: DISPATCH_TARGET, kind = ?request.get("type"), "unknown request type");
                Response::Ignored
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("catalog", &self.inner.catalog)
            .field("custom_handler", &self.inner.custom_handler.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a [`Router`].
///
/// Defaults: no custom handler, request logging through [`TracingLogger`]
/// with logging disabled.
#[must_use = "a RouterBuilder does nothing until .build() is called"]
pub struct RouterBuilder {
    /// Procedures to serve.
    tree: ProcedureTree,
    /// Fallback for foreign messages.
    custom_handler: Option<CustomHandler>,
    /// Explicit logger; overrides `logging`.
    logger: Option<Arc<dyn RequestLogger>>,
    /// Options for the default logger.
    logging: LoggingOptions,
}

impl RouterBuilder {
    /// Creates a builder over `tree`.
    pub fn new(tree: ProcedureTree) -> Self {
        Self {
            tree,
            custom_handler: None,
            logger: None,
            logging: LoggingOptions::default(),
        }
    }

    /// Sets the handler for messages that do not carry the protocol tag.
    ///
    /// Its response is returned to the channel unmodified.
    pub fn custom_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value, &Sender) -> Response + Send + Sync + 'static,
    {
        self.custom_handler = Some(Arc::new(handler));
        self
    }

    /// Replaces the request logger.
    pub fn logger(mut self, logger: impl RequestLogger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Configures the default [`TracingLogger`].
    pub const fn logging(mut self, options: LoggingOptions) -> Self {
        self.logging = options;
        self
    }

    /// Builds the router. The catalog is computed here, once.
    pub fn build(self) -> Router {
        let catalog = Catalog::build(&self.tree);
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger::new(self.logging)));
        Router {
            inner: Arc::new(Inner {
                tree: self.tree,
                catalog,
                custom_handler: self.custom_handler,
                logger,
            }),
        }
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("tree", &self.tree)
            .field("custom_handler", &self.custom_handler.is_some())
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::FutureExt;
    use hostcall_proto::Request;
    use serde_json::json;

    use super::*;
    use crate::logger::NoopLogger;
    use crate::{Node, Procedure};

    /// Logger that remembers what it saw.
    #[derive(Default)]
    struct Recorder(Arc<Mutex<Vec<Value>>>);

    impl RequestLogger for Recorder {
        fn log_request(&self, request: &Value) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(request.clone());
            }
        }
    }

    fn tree() -> ProcedureTree {
        ProcedureTree::new()
            .with("plain", Procedure::sync(|_, _| Ok::<_, String>("x")))
            .with(
                "later",
                Procedure::deferred(|_, _| async { Ok::<_, String>(42) }),
            )
            .with(
                "math",
                ProcedureTree::new().with("add", Procedure::sync(|_, _| Ok::<_, String>(0))),
            )
    }

    fn settle_now(response: Response) -> Option<Value> {
        response.settle().now_or_never().flatten()
    }

    #[test]
    fn catalog_query_returns_catalog() {
        let router = Router::new(tree());
        let response = router.handle(&Request::get_function_names().into_value(), &Sender::default());
        assert!(response.keeps_channel_open());
        assert_eq!(
            settle_now(response),
            Some(json!({
                "result": { "plain": "plain", "later": "later", "math": { "add": "add" } }
            }))
        );
    }

    #[test]
    fn catalog_is_stable_across_queries() {
        let router = Router::new(tree());
        let query = Request::get_function_names().into_value();
        let first = settle_now(router.handle(&query, &Sender::default()));
        for _ in 0..3 {
            assert_eq!(settle_now(router.handle(&query, &Sender::default())), first);
        }
        assert!(std::ptr::eq(router.catalog(), router.clone().catalog()));
    }

    #[test]
    fn invocation_replies_with_result() {
        let router = Router::new(tree());
        let response = router.handle(
            &Request::invoke(["plain"], Vec::new()).into_value(),
            &Sender::default(),
        );
        assert_eq!(settle_now(response), Some(json!({ "result": "x" })));
    }

    #[tokio::test]
    async fn deferred_invocation_keeps_channel_open() {
        let router = Router::new(tree());
        let response = router.handle(
            &Request::invoke(["later"], Vec::new()).into_value(),
            &Sender::default(),
        );
        assert!(matches!(response, Response::Reply(_)));
        assert_eq!(response.settle().await, Some(json!({ "result": 42 })));
    }

    #[test]
    fn unresolved_path_is_ignored() {
        let router = Router::new(tree());
        let response = router.handle(
            &Request::invoke(["math", "sub"], Vec::new()).into_value(),
            &Sender::default(),
        );
        assert!(matches!(response, Response::Ignored));
        assert!(!response.keeps_channel_open());
    }

    #[test]
    fn unknown_type_is_ignored() {
        let router = Router::new(tree());
        let request = json!({ "handler": PROTOCOL_TAG, "type": "DROP_TABLES" });
        assert!(matches!(
            router.handle(&request, &Sender::default()),
            Response::Ignored
        ));
    }

    #[test]
    fn foreign_message_without_handler_is_ignored() {
        let router = Router::new(tree());
        let request = json!({ "handler": "someone-else", "type": "INVOKE_FUNCTION" });
        assert!(matches!(
            router.handle(&request, &Sender::default()),
            Response::Ignored
        ));
        assert!(matches!(
            router.handle(&json!("just a string"), &Sender::default()),
            Response::Ignored
        ));
    }

    #[test]
    fn foreign_message_goes_to_custom_handler_verbatim() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let router = Router::builder(tree())
            .custom_handler(move |request, sender| {
                counter.fetch_add(1, Ordering::SeqCst);
                Response::Value(json!({ "echo": request, "from": sender.id }))
            })
            .build();

        let request = json!({ "handler": "other", "data": [1, 2] });
        let response = router.handle(&request, &Sender::default().with_id("tab"));
        let Response::Value(value) = response else {
            panic!("expected the custom handler's value");
        };
        assert_eq!(value, json!({ "echo": request, "from": "tab" }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Protocol traffic never reaches the custom handler.
        router.handle(&Request::get_function_names().into_value(), &Sender::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_handler_deferred_reply_passes_through() {
        let router = Router::builder(ProcedureTree::new())
            .custom_handler(|_, _| Response::deferred(async { json!("custom") }))
            .build();
        let response = router.handle(&json!({ "handler": "other" }), &Sender::default());
        assert!(response.keeps_channel_open());
        assert_eq!(settle_now(response), Some(json!("custom")));
    }

    #[test]
    fn only_invocations_are_logged() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = Router::builder(tree())
            .logger(Recorder(Arc::clone(&seen)))
            .build();

        let invoke = Request::invoke(["nope"], Vec::new()).into_value();
        router.handle(&Request::get_function_names().into_value(), &Sender::default());
        router.handle(&invoke, &Sender::default());
        router.handle(&json!({ "handler": "other" }), &Sender::default());

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![invoke]);
    }

    #[test]
    fn noop_logger_leaves_routing_unchanged() {
        let router = Router::builder(tree()).logger(NoopLogger).build();
        let response = router.handle(
            &Request::invoke(["plain"], Vec::new()).into_value(),
            &Sender::default(),
        );
        assert_eq!(settle_now(response), Some(json!({ "result": "x" })));
    }

    #[test]
    fn router_exposes_its_tree() {
        let router = Router::new(tree());
        let keys: Vec<&str> = router.tree().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["plain", "later", "math"]);
        assert!(matches!(router.tree().get("math"), Some(Node::Tree(sub)) if sub.len() == 1));
    }
}
