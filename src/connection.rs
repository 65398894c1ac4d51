use super::s11n::NULL_REQUEST_ID;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use std::io;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

/// Where a request's records go. Writes are only queued; nothing reaches the backend before
/// `flush`.
pub trait BackendChannel {
    /// Whether anything is attached to consume the written buffers.
    fn has_handler(&self) -> bool;

    /// Queue a buffer. The channel owns `buf` from here on, even if this returns an error.
    fn write(&mut self, buf: Bytes) -> io::Result<()>;

    /// Hand everything queued so far to the backend in one piece.
    fn flush(&mut self) -> io::Result<()>;
}

type Batch = Vec<Bytes>;

/// A persistent connection to a FastCGI backend, shared by many requests. Each clone is a handle
/// to the same writer task.
#[derive(Clone, Debug)]
pub struct FastcgiConnection {
    sender: mpsc::UnboundedSender<Batch>,
    next_request_id: Arc<AtomicU16>,
}

impl FastcgiConnection {
    /// Start the writer task for `writer` on the current tokio runtime. The task exits when every
    /// handle is dropped, or on the first write error.
    pub fn spawn<W>(writer: W) -> FastcgiConnection
        where W: AsyncWrite + Unpin + Send + 'static
    {
        let (sender, receiver) = mpsc::unbounded();
        tokio::spawn(async move {
            if let Err(e) = write_batches(writer, receiver).await {
                error!("FastCGI connection writer failed: {}", e);
            }
        });
        FastcgiConnection {
            sender,
            next_request_id: Arc::new(AtomicU16::new(1)),
        }
    }

    /// Allocate a request id, cycling through 1..=65535.
    pub fn next_request_id(&self) -> u16 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != NULL_REQUEST_ID {
                return id;
            }
        }
    }

    /// A writer that stages one request's buffers and submits them together on flush, so records
    /// of concurrent requests never interleave.
    pub fn writer(&self) -> ConnectionWriter {
        ConnectionWriter {
            sender: self.sender.clone(),
            pending: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn write_batches<W>(mut writer: W, mut receiver: mpsc::UnboundedReceiver<Batch>)
    -> io::Result<()>
    where W: AsyncWrite + Unpin
{
    while let Some(batch) = receiver.next().await {
        let total: usize = batch.iter().map(Bytes::len).sum();
        debug!("writing batch of {} buffers, {} bytes", batch.len(), total);
        for mut buf in batch {
            writer.write_all_buf(&mut buf).await?;
        }
        writer.flush().await?;
    }
    debug!("all connection handles dropped; shutting down writer");
    writer.shutdown().await
}

pub struct ConnectionWriter {
    sender: mpsc::UnboundedSender<Batch>,
    pending: Batch,
}

impl BackendChannel for ConnectionWriter {
    fn has_handler(&self) -> bool {
        !self.sender.is_closed()
    }

    fn write(&mut self, buf: Bytes) -> io::Result<()> {
        if self.sender.is_closed() {
            let msg = "FastCGI connection writer is gone";
            error!("{}", msg);
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, msg));
        }
        self.pending.push(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = mem::take(&mut self.pending);
        self.sender
            .unbounded_send(batch)
            .map_err(|e| {
                error!("failed to queue records: {}", e);
                io::Error::new(io::ErrorKind::BrokenPipe, e.to_string())
            })
    }
}

impl Drop for ConnectionWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!("ConnectionWriter dropped with {} un-flushed buffers!", self.pending.len());
        }
    }
}
