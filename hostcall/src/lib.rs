//! Minimal request/one-reply RPC between a long-lived host and short-lived
//! clients.
//!
//! The host registers its procedures once as a nested [`ProcedureTree`] and
//! hands a [`Router`] to whatever channel delivers client messages. Clients
//! discover what they can call through the [`Catalog`] and invoke procedures
//! by path. Every invocation that resolves gets exactly one reply envelope,
//! `{"result": ..}` or `{"error": ..}`, whether the procedure answered
//! immediately or later.
//!
//! # Quick start
//!
//! ```
//! use futures_util::FutureExt;
//! use hostcall::{Procedure, ProcedureTree, Router};
//! use hostcall_proto::{Request, Sender};
//! use serde_json::json;
//!
//! let tree = ProcedureTree::new().with(
//!     "math",
//!     ProcedureTree::new().with(
//!         "add",
//!         Procedure::sync(|args, _| {
//!             Ok::<_, String>(args.iter().filter_map(|v| v.as_i64()).sum::<i64>())
//!         }),
//!     ),
//! );
//! let router = Router::new(tree);
//!
//! let catalog = router.catalog().as_value();
//! assert_eq!(catalog, &json!({ "math": { "add": "add" } }));
//!
//! let request = Request::invoke(["math", "add"], vec![json!(1), json!(2)]).into_value();
//! let reply = router.handle(&request, &Sender::default()).settle().now_or_never();
//! assert_eq!(reply, Some(Some(json!({ "result": 3 }))));
//! ```

mod catalog;
mod channel;
mod client;
mod dispatch;
mod error;
mod logger;
mod resolve;
mod router;
mod tree;

pub use catalog::Catalog;
pub use channel::serve;
pub use client::Client;
pub use dispatch::{DISPATCH_TARGET, PendingReply, dispatch};
pub use error::{Error, Result};
pub use hostcall_proto::{Path, Reply, Sender};
pub use logger::{LogLevel, LoggingOptions, NoopLogger, REQUEST_TARGET, RequestLogger, TracingLogger};
pub use resolve::{Resolved, resolve, resolve_value};
pub use router::{CustomHandler, Response, Router, RouterBuilder};
pub use tree::{Deferred, InvocationContext, Node, Outcome, Procedure, ProcedureError, ProcedureTree};
