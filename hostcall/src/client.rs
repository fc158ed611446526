//! Client-side access to a host's procedures.
//!
//! A [`Client`] speaks the [`hostcall_proto`] frame protocol over any async
//! byte stream, typically the other end of a [`crate::serve`] loop.

use hostcall_proto::{Frame, Path, Reply, Request, Sender};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{Error, Result};

/// A client connection to a host.
///
/// Requests are issued one at a time; each waits for its own reply.
#[derive(Debug)]
pub struct Client<R, W> {
    /// Buffered read half.
    reader: BufReader<R>,
    /// Write half.
    writer: W,
    /// Identity attached to every request.
    sender: Sender,
    /// Id of the next request frame.
    next_id: u64,
}

impl<R, W> Client<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps the two halves of a connection to a host.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            sender: Sender::default(),
            next_id: 1,
        }
    }

    /// Sets the sender metadata attached to every request.
    #[must_use]
    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = sender;
        self
    }

    /// Fetches the host's catalog of callable paths.
    pub async fn catalog(&mut self) -> Result<Catalog> {
        let value = self.call(Request::get_function_names()).await?;
        Ok(Catalog::from_value(value))
    }

    /// Invokes the procedure at `path` with positional `args`.
    pub async fn invoke(&mut self, path: impl Into<Path>, args: Vec<Value>) -> Result<Value> {
        self.call(Request::invoke(path, args)).await
    }

    /// Sends an arbitrary message and waits for the outcome.
    ///
    /// Returns `Ok(None)` if the host will not reply.
    pub async fn send(&mut self, message: Value) -> Result<Option<Value>> {
        let id = self.next_id;
        self.next_id += 1;

        let frame = Frame::Request {
            id,
            sender: self.sender.clone(),
            message,
        };
        hostcall_proto::send(&mut self.writer, &frame).await?;
        self.writer.flush().await?;

        loop {
            match hostcall_proto::recv::<Frame>(&mut self.reader).await? {
                Frame::Reply { id: got, body } if got == id => return Ok(Some(body)),
                Frame::Closed { id: got } if got == id => return Ok(None),
                Frame::Reply { id: got, .. } | Frame::Closed { id: got } => {
                    debug!(expected = id, got, "discarding stale frame");
                }
                _ => {
                    return Err(Error::UnexpectedReply(
                        "request frame from host".to_owned(),
                    ));
                }
            }
        }
    }

    /// Sends a protocol request and unwraps its reply envelope.
    async fn call(&mut self, request: Request) -> Result<Value> {
        let body = self
            .send(request.into_value())
            .await?
            .ok_or(Error::Unhandled)?;
        let reply = Reply::from_value(&body).ok_or_else(|| Error::UnexpectedReply(body.to_string()))?;
        reply.into_result().map_err(Error::Remote)
    }
}
