//! Dedicated writer task for sending messages on a connection.
//!
//! Producers never touch the socket. They hand messages to a
//! [`WriterHandle`], which fragments them if needed and queues the physical
//! messages on a bounded mpsc channel; a single task drains the channel and
//! writes batches with scatter/gather I/O.
//!
//! # Architecture
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► WriterHandle ─► mpsc::Sender<OutboundMessage> ─► Writer Task ─► Socket
//! Caller N ─┘   (fragments)
//! ```
//!
//! The frames of one physical message always go out back to back, because
//! the receiver groups frames into messages by the final-frame flag. A full
//! channel makes `send` wait, which is all the backpressure there is.

use std::io::IoSlice;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{GridwireError, Result};
use crate::protocol::{
    frame_headers, split, FrameHeader, Message, DEFAULT_MAX_FRAGMENT_SIZE, DEFAULT_MAX_FRAME_SIZE,
    SIZE_OF_FRAME_LENGTH_AND_FLAGS,
};

/// Default channel capacity (physical messages).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum messages to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded length and flags prefix.
    pub header: [u8; SIZE_OF_FRAME_LENGTH_AND_FLAGS],
    /// Content bytes, shared with the frame they came from.
    pub content: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &FrameHeader, content: Bytes) -> Self {
        Self {
            header: header.encode(),
            content,
        }
    }

    /// Total size of this frame (prefix + content).
    #[inline]
    pub fn size(&self) -> usize {
        SIZE_OF_FRAME_LENGTH_AND_FLAGS + self.content.len()
    }
}

/// The frames of one physical message, last one marked final.
#[derive(Debug)]
pub struct OutboundMessage {
    frames: Vec<OutboundFrame>,
}

impl OutboundMessage {
    /// Prepare a message for writing.
    pub fn encode(message: &Message) -> Self {
        let frames = frame_headers(message)
            .map(|(header, frame)| OutboundFrame::new(&header, frame.content_bytes()))
            .collect();
        Self { frames }
    }

    /// Frames in write order.
    pub fn frames(&self) -> &[OutboundFrame] {
        &self.frames
    }

    /// Total size on the wire.
    pub fn size(&self) -> usize {
        self.frames.iter().map(OutboundFrame::size).sum()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Channel capacity for the message queue.
    pub channel_capacity: usize,
    /// Messages above this wire size are fragmented.
    pub max_fragment_size: usize,
    /// Largest frame the peer accepts.
    pub max_frame_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Handle for sending messages to the writer task.
///
/// This is cheaply cloneable and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    /// Channel sender for physical messages.
    tx: mpsc::Sender<OutboundMessage>,
    /// Source of fragmentation ids for this connection.
    fragmentation_ids: Arc<AtomicI64>,
    /// Fragmentation threshold.
    max_fragment_size: usize,
    /// Frame size limit of the peer.
    max_frame_size: usize,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<OutboundMessage>, config: &WriterConfig) -> Self {
        Self {
            tx,
            fragmentation_ids: Arc::new(AtomicI64::new(1)),
            max_fragment_size: config.max_fragment_size,
            max_frame_size: config.max_frame_size,
        }
    }

    /// Queue a message, fragmenting it when it exceeds the configured size.
    ///
    /// Waits while the channel is full.
    ///
    /// # Errors
    ///
    /// - [`GridwireError::FrameTooLarge`] if a frame is above the peer's
    ///   limit; nothing is queued and the connection stays usable
    /// - [`GridwireError::ConnectionClosed`] if the writer task has stopped
    pub async fn send(&self, message: Message) -> Result<()> {
        if let Some(size) = message
            .frames()
            .iter()
            .map(|frame| frame.wire_size())
            .find(|&size| size > self.max_frame_size)
        {
            return Err(GridwireError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        let fragmentation_id = if message.frame_length() > self.max_fragment_size {
            self.fragmentation_ids.fetch_add(1, Ordering::Relaxed)
        } else {
            0
        };

        let fragments = split(message, self.max_fragment_size, fragmentation_id);
        if fragments.len() > 1 {
            tracing::trace!(
                fragmentation_id,
                fragments = fragments.len(),
                "Fragmenting message"
            );
        }
        for fragment in &fragments {
            self.tx
                .send(OutboundMessage::encode(fragment))
                .await
                .map_err(|_| GridwireError::ConnectionClosed)?;
        }
        Ok(())
    }

    /// Check if the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending messages.
///
/// # Returns
///
/// A tuple of `(WriterHandle, JoinHandle)` where the JoinHandle can be used
/// to wait for the writer task to complete.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let handle = WriterHandle::new(tx, &config);
    let task = tokio::spawn(writer_loop(rx, writer));
    (handle, task)
}

/// Main writer loop - receives messages and writes them in batches.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundMessage>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(first) = rx.recv().await else {
            // All handles dropped, clean shutdown.
            writer.shutdown().await.ok();
            return Ok(());
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Writer task failed: {}", e);
            return Err(e);
        }
    }
}

/// Write a batch of messages using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundMessage]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundMessage::size).sum();
    if total_size == 0 {
        return Ok(());
    }

    let mut total_written = 0;
    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(GridwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data after the first `skip_bytes` bytes.
fn build_remaining_slices(batch: &[OutboundMessage], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::new();
    let mut offset = 0;

    let parts = batch
        .iter()
        .flat_map(|m| m.frames())
        .flat_map(|f| [&f.header[..], &f.content[..]]);

    for part in parts {
        let end = offset + part.len();
        if !part.is_empty() && skip_bytes < end {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&part[start..]));
        }
        offset = end;
    }

    slices
}
