//! Invocation dispatch: path lookup, call, and reply normalization.
//!
//! Whatever a resolved path turns out to be, the caller gets back a single
//! [`PendingReply`]. Plain values and synchronous failures are already
//! settled; deferred results settle when the procedure's future does. A
//! pending reply never fails: procedure failures, panics included, become
//! [`Reply::Error`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use hostcall_proto::{Invocation, Path, Reply, Sender};
use serde_json::Value;
use tracing::{debug, warn};

use crate::resolve::{Resolved, resolve};
use crate::tree::{InvocationContext, Outcome, ProcedureError, ProcedureTree};

/// Tracing target for dispatch operations.
pub const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// A reply envelope that may not be available yet.
pub type PendingReply = BoxFuture<'static, Reply>;

/// Dispatches an invocation request against `tree`.
///
/// Returns `None` when the request does not resolve to anything: the path is
/// not registered, or the payload is too malformed to name a path. No reply
/// should be sent in that case.
pub fn dispatch(tree: &ProcedureTree, request: &Value, sender: &Sender) -> Option<PendingReply> {
    let Some(invocation) = request.get("payload").and_then(Invocation::from_payload) else {
        warn!(target: DISPATCH_TARGET, "invocation request without a usable payload");
        return None;
    };
    let path = invocation.path;

    let procedure = match resolve(tree, path.segments()) {
        None => {
            debug!(target: DISPATCH_TARGET, %path, "path not registered");
            return None;
        }
        Some(Resolved::Procedure(procedure)) => procedure.clone(),
        Some(Resolved::Tree(sub)) => return Some(settled(Reply::Result(sub.to_value()))),
        Some(Resolved::Data(data)) => return Some(settled(Reply::Result(data.clone()))),
    };

    debug!(
        target: DISPATCH_TARGET,
        %path,
        args = invocation.args.len(),
        "invoking procedure"
    );
    let ctx = InvocationContext::new(request.clone(), sender.clone());
    let args = invocation.args;
    match panic::catch_unwind(AssertUnwindSafe(|| procedure.call(args, ctx))) {
        Ok(Outcome::Ready(result)) => Some(settled(envelope(&path, result))),
        Ok(Outcome::Deferred(pending)) => Some(
            async move {
                let result = AssertUnwindSafe(pending)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(panicked(&path, &*payload)));
                envelope(&path, result)
            }
            .boxed(),
        ),
        Err(payload) => Some(settled(envelope(&path, Err(panicked(&path, &*payload))))),
    }
}

/// Turns a caught panic into a procedure failure.
fn panicked(path: &Path, payload: &(dyn Any + Send)) -> ProcedureError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    warn!(target: DISPATCH_TARGET, %path, %message, "procedure panicked");
    ProcedureError::from(format!("procedure panicked: {message}"))
}

/// Wraps an already known reply.
fn settled(reply: Reply) -> PendingReply {
    future::ready(reply).boxed()
}

fn envelope(path: &Path, result: Result<Value, ProcedureError>) -> Reply {
    match result {
        Ok(value) => Reply::Result(value),
        Err(e) => {
            debug!(target: DISPATCH_TARGET, %path, error = %e, "procedure failed");
            Reply::Error(e.into_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hostcall_proto::Request;
    use serde_json::json;

    use super::*;
    use crate::Procedure;

    fn tree() -> ProcedureTree {
        ProcedureTree::new()
            .with("plain", Procedure::sync(|_, _| Ok::<_, String>("x")))
            .with(
                "boom",
                Procedure::sync(|_, _| Err::<(), _>(std::io::Error::other("boom"))),
            )
            .with(
                "later",
                Procedure::deferred(|_, _| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, String>(42)
                }),
            )
            .with(
                "later_boom",
                Procedure::deferred(|_, _| async { Err::<(), _>("deferred boom") }),
            )
            .with(
                "sum",
                Procedure::sync(|args, _| {
                    Ok::<_, String>(args.iter().filter_map(Value::as_i64).sum::<i64>())
                }),
            )
            .with(
                "whoami",
                Procedure::sync(|_, ctx: InvocationContext| {
                    Ok::<_, String>(json!({
                        "sender": ctx.sender.id,
                        "type": ctx.request["type"],
                    }))
                }),
            )
            .with(
                "index",
                Procedure::sync(|args: Vec<Value>, _| Ok::<_, String>(args[0].clone())),
            )
            .with(
                "later_index",
                Procedure::deferred(|args: Vec<Value>, _| async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok::<_, String>(args[0].clone())
                }),
            )
            .with("settings", json!({ "theme": "dark" }))
            .with(
                "nested",
                ProcedureTree::new()
                    .with("inner", Procedure::sync(|_, _| Ok::<_, String>(1)))
                    .with("limit", json!(3)),
            )
    }

    fn panic_reply(reply: Reply) -> String {
        match reply {
            Reply::Error(message) => message,
            other => panic!("expected an error envelope, got {other:?}"),
        }
    }

    fn invoke(path: &[&str], args: Vec<Value>) -> Value {
        Request::invoke(path.iter().copied().collect::<Path>(), args).into_value()
    }

    fn run(path: &[&str], args: Vec<Value>) -> Option<PendingReply> {
        dispatch(&tree(), &invoke(path, args), &Sender::default())
    }

    #[test]
    fn plain_value_is_ready_immediately() {
        let pending = run(&["plain"], Vec::new()).unwrap();
        assert_eq!(pending.now_or_never(), Some(Reply::Result(json!("x"))));
    }

    #[test]
    fn sync_failure_becomes_error_envelope() {
        let pending = run(&["boom"], Vec::new()).unwrap();
        assert_eq!(pending.now_or_never(), Some(Reply::Error("boom".into())));
    }

    #[tokio::test]
    async fn deferred_value_settles_into_result() {
        let reply = run(&["later"], Vec::new()).unwrap().await;
        assert_eq!(reply, Reply::Result(json!(42)));
    }

    #[tokio::test]
    async fn deferred_failure_settles_into_error() {
        let reply = run(&["later_boom"], Vec::new()).unwrap().await;
        assert_eq!(reply, Reply::Error("deferred boom".into()));
    }

    #[test]
    fn arguments_are_spread_in_order() {
        let pending = run(&["sum"], vec![json!(1), json!(2), json!(39)]).unwrap();
        assert_eq!(pending.now_or_never(), Some(Reply::Result(json!(42))));
    }

    #[test]
    fn context_carries_request_and_sender() {
        let request = invoke(&["whoami"], Vec::new());
        let sender = Sender::default().with_id("popup");
        let reply = dispatch(&tree(), &request, &sender)
            .unwrap()
            .now_or_never()
            .unwrap();
        assert_eq!(
            reply,
            Reply::Result(json!({ "sender": "popup", "type": "INVOKE_FUNCTION" }))
        );
    }

    #[test]
    fn unknown_path_yields_no_reply() {
        assert!(run(&["missing"], Vec::new()).is_none());
        assert!(run(&["plain", "deeper"], Vec::new()).is_none());
    }

    #[test]
    fn data_paths_return_the_data() {
        let reply = run(&["settings", "theme"], Vec::new()).unwrap().now_or_never();
        assert_eq!(reply, Some(Reply::Result(json!("dark"))));
    }

    #[test]
    fn subtree_paths_return_their_data_view() {
        let reply = run(&["nested"], Vec::new()).unwrap().now_or_never();
        assert_eq!(reply, Some(Reply::Result(json!({ "limit": 3 }))));
    }

    #[test]
    fn sync_panic_becomes_error_envelope() {
        let reply = run(&["index"], Vec::new()).unwrap().now_or_never().unwrap();
        let message = panic_reply(reply);
        assert!(message.starts_with("procedure panicked: index out of bounds"), "{message}");

        // The same tree keeps serving afterwards.
        let pending = run(&["plain"], Vec::new()).unwrap();
        assert_eq!(pending.now_or_never(), Some(Reply::Result(json!("x"))));
    }

    #[tokio::test]
    async fn deferred_panic_settles_into_error() {
        let reply = run(&["later_index"], Vec::new()).unwrap().await;
        let message = panic_reply(reply);
        assert!(message.starts_with("procedure panicked: index out of bounds"), "{message}");
    }

    #[test]
    fn panic_with_owned_message_keeps_it() {
        let tree = ProcedureTree::new().with(
            "fail",
            Procedure::sync(|args: Vec<Value>, _| -> Result<(), String> {
                panic!("{} arguments is too many", args.len())
            }),
        );
        let reply = dispatch(&tree, &invoke(&["fail"], vec![json!(1), json!(2)]), &Sender::default())
            .unwrap()
            .now_or_never();
        assert_eq!(
            reply,
            Some(Reply::Error("procedure panicked: 2 arguments is too many".into()))
        );
    }

    #[test]
    fn empty_path_addresses_the_root() {
        let reply = run(&[], Vec::new()).unwrap().now_or_never().unwrap();
        let Reply::Result(Value::Object(root)) = reply else {
            panic!("expected the root tree");
        };
        assert_eq!(root.get("settings"), Some(&json!({ "theme": "dark" })));
        assert_eq!(root.get("nested"), Some(&json!({ "limit": 3 })));
        assert!(!root.contains_key("plain"));
    }

    #[test]
    fn malformed_payloads_are_ignored() {
        let sender = Sender::default();
        let t = tree();
        let no_payload = json!({ "handler": "hostcall", "type": "INVOKE_FUNCTION" });
        let bad_path = json!({
            "handler": "hostcall",
            "type": "INVOKE_FUNCTION",
            "payload": { "path": "plain" }
        });
        assert!(dispatch(&t, &no_payload, &sender).is_none());
        assert!(dispatch(&t, &bad_path, &sender).is_none());
    }

    #[test]
    fn missing_args_means_no_arguments() {
        let request = json!({
            "handler": "hostcall",
            "type": "INVOKE_FUNCTION",
            "payload": { "path": ["sum"] }
        });
        let reply = dispatch(&tree(), &request, &Sender::default())
            .unwrap()
            .now_or_never();
        assert_eq!(reply, Some(Reply::Result(json!(0))));
    }
}
