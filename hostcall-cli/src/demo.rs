//! Built-in procedure tree used by the CLI.

use std::time::Duration;

use hostcall::{InvocationContext, Procedure, ProcedureTree};
use serde_json::{Value, json};

/// Returns argument `i` as a number, or a descriptive error.
fn number(args: &[Value], i: usize) -> Result<f64, String> {
    args.get(i)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("argument {i} must be a number"))
}

/// The demo registration tree.
pub fn tree() -> ProcedureTree {
    ProcedureTree::new()
        .with(
            "echo",
            Procedure::sync(|args: Vec<Value>, _| Ok::<_, String>(args)),
        )
        .with(
            "math",
            ProcedureTree::new()
                .with(
                    "add",
                    Procedure::sync(|args: Vec<Value>, _| {
                        Ok::<_, String>(number(&args, 0)? + number(&args, 1)?)
                    }),
                )
                .with(
                    "sum",
                    Procedure::sync(|args: Vec<Value>, _| {
                        args.iter().enumerate().try_fold(0.0, |acc, (i, v)| {
                            v.as_f64()
                                .map(|n| acc + n)
                                .ok_or_else(|| format!("argument {i} must be a number"))
                        })
                    }),
                )
                .with(
                    "divide",
                    Procedure::sync(|args: Vec<Value>, _| {
                        let divisor = number(&args, 1)?;
                        if divisor == 0.0 {
                            return Err("division by zero".to_owned());
                        }
                        Ok(number(&args, 0)? / divisor)
                    }),
                ),
        )
        .with(
            "time",
            ProcedureTree::new().with(
                "sleep",
                Procedure::deferred(|args: Vec<Value>, _| async move {
                    let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, String>(json!({ "slept_ms": ms }))
                }),
            ),
        )
        .with(
            "info",
            ProcedureTree::new().with("version", json!(env!("CARGO_PKG_VERSION"))),
        )
        .with(
            "context",
            ProcedureTree::new().with(
                "sender",
                Procedure::sync(|_, ctx: InvocationContext| Ok::<_, String>(ctx.sender)),
            ),
        )
}
