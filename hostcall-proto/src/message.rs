//! Protocol message types for host↔client communication.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Path;

/// Reserved `handler` tag that marks a message as belonging to this protocol.
pub const PROTOCOL_TAG: &str = "hostcall";

/// Request type asking for the catalog of callable paths.
pub const GET_FUNCTION_NAMES: &str = "GET_FUNCTION_NAMES";

/// Request type asking for a procedure to be invoked.
pub const INVOKE_FUNCTION: &str = "INVOKE_FUNCTION";

/// The closed set of request kinds the host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RequestKind {
    /// Return the catalog of callable paths.
    #[serde(rename = "GET_FUNCTION_NAMES")]
    GetFunctionNames,
    /// Invoke the procedure at a path.
    #[serde(rename = "INVOKE_FUNCTION")]
    InvokeFunction,
}

impl RequestKind {
    /// Parses a wire `type` string. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            GET_FUNCTION_NAMES => Some(Self::GetFunctionNames),
            INVOKE_FUNCTION => Some(Self::InvokeFunction),
            _ => None,
        }
    }

    /// Returns the wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetFunctionNames => GET_FUNCTION_NAMES,
            Self::InvokeFunction => INVOKE_FUNCTION,
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an [`RequestKind::InvokeFunction`] request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Invocation {
    /// Location of the procedure in the host's registration tree.
    pub path: Path,
    /// Positional arguments. Absent on the wire means no arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Invocation {
    /// Creates an invocation of `path` with `args`.
    pub fn new(path: impl Into<Path>, args: Vec<Value>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }

    /// Extracts the invocation from a raw request payload.
    ///
    /// Returns `None` when the payload is not an object, lacks a `path`, or
    /// carries a path with non-string segments.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        Self::deserialize(payload).ok()
    }
}

/// A protocol request as sent by a client.
///
/// The host never requires this typed form: it reads the raw JSON so that
/// messages for other handlers pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Request {
    /// Protocol tag, [`PROTOCOL_TAG`] for hostcall requests.
    pub handler: String,
    /// What the client is asking for.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Invocation payload, present for [`RequestKind::InvokeFunction`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Invocation>,
}

impl Request {
    /// A catalog query.
    pub fn get_function_names() -> Self {
        Self {
            handler: PROTOCOL_TAG.to_owned(),
            kind: RequestKind::GetFunctionNames,
            payload: None,
        }
    }

    /// An invocation of `path` with positional `args`.
    pub fn invoke(path: impl Into<Path>, args: Vec<Value>) -> Self {
        Self {
            handler: PROTOCOL_TAG.to_owned(),
            kind: RequestKind::InvokeFunction,
            payload: Some(Invocation::new(path, args)),
        }
    }

    /// Converts the request into the JSON tree that crosses the channel.
    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("handler".to_owned(), Value::String(self.handler));
        map.insert("type".to_owned(), Value::String(self.kind.as_str().to_owned()));
        if let Some(payload) = self.payload {
            let mut inner = Map::new();
            inner.insert("path".to_owned(), payload.path.into_value());
            inner.insert("args".to_owned(), Value::Array(payload.args));
            map.insert("payload".to_owned(), Value::Object(inner));
        }
        Value::Object(map)
    }
}

/// Reply envelope: exactly one of a result or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Reply {
    /// The procedure completed (or the path addressed plain data).
    Result(Value),
    /// The procedure failed with this message.
    Error(String),
}

impl Reply {
    /// Builds an error reply from anything printable.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error(message.to_string())
    }

    /// Converts the envelope into `{"result": ..}` / `{"error": ..}`.
    pub fn into_value(self) -> Value {
        let (key, value) = match self {
            Self::Result(v) => ("result", v),
            Self::Error(e) => ("error", Value::String(e)),
        };
        let mut map = Map::with_capacity(1);
        map.insert(key.to_owned(), value);
        Value::Object(map)
    }

    /// Interprets a reply body received from the channel.
    ///
    /// Returns `None` unless the body is an object holding exactly one of
    /// `result` or a string `error`.
    pub fn from_value(body: &Value) -> Option<Self> {
        let map = body.as_object()?;
        if map.len() != 1 {
            return None;
        }
        if let Some(result) = map.get("result") {
            return Some(Self::Result(result.clone()));
        }
        map.get("error")
            .and_then(Value::as_str)
            .map(|e| Self::Error(e.to_owned()))
    }

    /// Splits the envelope into a standard `Result`.
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Self::Result(v) => Ok(v),
            Self::Error(e) => Err(e),
        }
    }
}

/// Metadata about the client context that sent a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Sender {
    /// Identifier of the sending context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// URL of the page or document that sent the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Origin of the sending context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Sender {
    /// Sets the sender identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the sender URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the sender origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Unit of transfer on a byte-stream channel.
///
/// Every [`Frame::Request`] is answered by exactly one [`Frame::Reply`] or
/// [`Frame::Closed`] carrying the same `id`, in no particular order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[non_exhaustive]
pub enum Frame {
    /// A message from a client context.
    Request {
        /// Correlation id chosen by the client.
        id: u64,
        /// Who is asking.
        #[serde(default)]
        sender: Sender,
        /// The raw message.
        message: Value,
    },
    /// The single reply to request `id`.
    Reply {
        /// Correlation id of the request.
        id: u64,
        /// Reply body.
        body: Value,
    },
    /// Request `id` will not be answered.
    Closed {
        /// Correlation id of the request.
        id: u64,
    },
}
