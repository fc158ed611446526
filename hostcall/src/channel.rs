//! Serving a [`Router`] over a byte stream.
//!
//! Each [`Frame::Request`] is handed to the router. Immediate outcomes are
//! answered in-line with [`Frame::Closed`]; deferred replies are awaited on
//! their own task, so one slow procedure never holds up the next message.
//! Replies go out in completion order, not request order.

use std::io;

use hostcall_proto::Frame;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatch::DISPATCH_TARGET;
use crate::router::Router;

/// Serves `router` until the reader reaches end of stream.
///
/// Replies still pending at end of stream are delivered before returning.
pub async fn serve<R, W>(router: Router, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut r = BufReader::new(reader);
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(rx, writer));

    let read_result = loop {
        let frame: Frame = match hostcall_proto::recv(&mut r).await {
            Ok(frame) => frame,
            // Clean disconnect.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break Ok(()),
            Err(e) => break Err(e),
        };

        let Frame::Request {
            id,
            sender,
            message,
        } = frame
        else {
            warn!(target: DISPATCH_TARGET, "ignoring non-request frame");
            continue;
        };

        let response = router.handle(&message, &sender);
        if response.keeps_channel_open() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let frame = match response.settle().await {
                    Some(body) => Frame::Reply { id, body },
                    None => Frame::Closed { id },
                };
                if tx.send(frame).is_err() {
                    debug!(target: DISPATCH_TARGET, id, "writer gone, reply dropped");
                }
            });
        } else if tx.send(Frame::Closed { id }).is_err() {
            debug!(target: DISPATCH_TARGET, id, "writer gone, close dropped");
        }
    };

    // The writer finishes once every spawned reply has released its sender.
    drop(tx);
    let write_result = writer_task.await.map_err(io::Error::other)?;
    read_result.and(write_result)
}

/// Drains `rx` into `writer`, one flushed frame at a time.
async fn write_frames<W: AsyncWrite + Unpin>(
    mut rx: mpsc::UnboundedReceiver<Frame>,
    writer: W,
) -> io::Result<()> {
    let mut w = BufWriter::new(writer);
    while let Some(frame) = rx.recv().await {
        hostcall_proto::send(&mut w, &frame).await?;
        w.flush().await?;
    }
    w.shutdown().await
}
