//! Streaming multipart encoder for single-file uploads.
//!
//! # Design
//! The encoder never materializes the framed body. A producer task writes the
//! boundary prologue, the source in fixed-size chunks, and the closing
//! boundary into a bounded channel; the request body consumes the other end
//! as a stream. The channel bound is the only in-flight window, so a
//! multi-gigabyte source costs a handful of chunks of memory. Backpressure is
//! inherent: the producer suspends until the request body drains.
//!
//! On a source read error the producer forwards the error down the pipe and
//! returns without the closing boundary, so the consumer always observes a
//! failed or truncated stream rather than a silently complete body. The
//! sender is dropped on every exit path, which ends the stream
//! deterministically.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Copy window for the producer task.
const CHUNK_SIZE: usize = 64 * 1024;

/// In-flight chunks allowed between producer and request body.
const PIPE_DEPTH: usize = 8;

/// A `multipart/form-data` body with exactly one file part, produced lazily.
pub struct StreamingForm {
    content_type: String,
    body: reqwest::Body,
}

impl StreamingForm {
    /// Frame `source` as the file part `field` with the given filename.
    ///
    /// Spawns the producer task immediately; nothing is read from `source`
    /// until the returned body is polled.
    pub fn file_part<R>(field: &str, filename: &str, source: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let boundary = format!("------------{}", Uuid::new_v4().simple());
        let content_type = format!("multipart/form-data; boundary={boundary}");

        let prologue = Bytes::from(format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        ));
        let epilogue = Bytes::from(format!("\r\n--{boundary}--\r\n"));

        let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(PIPE_DEPTH);
        tokio::spawn(produce(source, prologue, epilogue, tx));

        Self {
            content_type,
            body: reqwest::Body::wrap_stream(ReceiverStream::new(rx)),
        }
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn into_body(self) -> reqwest::Body {
        self.body
    }

    #[cfg(test)]
    fn into_parts(self) -> (String, reqwest::Body) {
        (self.content_type, self.body)
    }
}

/// Producer half of the pipe: multipart framing around a chunked copy.
///
/// A send error means the consumer went away (request aborted); the producer
/// just stops, there is nobody left to notify.
async fn produce<R>(
    mut source: R,
    prologue: Bytes,
    epilogue: Bytes,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
) where
    R: AsyncRead + Unpin,
{
    if tx.send(Ok(prologue)).await.is_err() {
        return;
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(err)).await;
                return;
            }
        }
    }

    let _ = tx.send(Ok(epilogue)).await;
}

/// An `AsyncRead` yielding `remaining` zero bytes.
///
/// Stands in for the synthetic POST payload so arbitrary sizes cost O(1)
/// memory instead of one up-front allocation.
#[derive(Debug)]
pub struct ZeroSource {
    remaining: u64,
}

static ZEROES: [u8; 8192] = [0; 8192];

impl ZeroSource {
    pub fn new(len: u64) -> Self {
        Self { remaining: len }
    }
}

impl AsyncRead for ZeroSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining > 0 {
            let n = usize::try_from(self.remaining)
                .unwrap_or(usize::MAX)
                .min(buf.remaining())
                .min(ZEROES.len());
            buf.put_slice(&ZEROES[..n]);
            self.remaining -= n as u64;
        }
        Poll::Ready(Ok(()))
    }
}
