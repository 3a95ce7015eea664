//! Outgoing stream handles.
//!
//! Writes land in a per-stream buffer guarded by a mutex and are drained by
//! the session driver on each paced send round. Handles are cheap clones of
//! one shared core.

use std::sync::{Arc, Weak};

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::dispatch::{Dispatcher, ReadyStream};
use super::driver::Command;
use super::listener::SendStreamStatsCallback;
use crate::core::{
    Result, SendStreamStats, StreamDirection, StreamError, StreamId, StreamState,
    WebTransportError,
};

#[derive(Debug)]
struct Buffers {
    state: StreamState,
    outbound: BytesMut,
    inbound: BytesMut,
    bytes_written: u64,
    bytes_sent: u64,
    bytes_received: u64,
    /// Released by session teardown rather than `close`.
    session_closed: bool,
}

impl Buffers {
    fn released_error(&self) -> StreamError {
        if self.session_closed {
            StreamError::SessionClosed
        } else {
            StreamError::StreamClosed
        }
    }
}

/// State shared by every handle of one stream and the driver.
#[derive(Debug)]
pub(crate) struct StreamCore {
    id: StreamId,
    direction: StreamDirection,
    buffers: Mutex<Buffers>,
    commands: mpsc::UnboundedSender<Command>,
    dispatcher: Dispatcher,
}

impl StreamCore {
    pub(crate) fn new(
        id: StreamId,
        direction: StreamDirection,
        commands: mpsc::UnboundedSender<Command>,
        dispatcher: Dispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            direction,
            buffers: Mutex::new(Buffers {
                state: StreamState::Pending,
                outbound: BytesMut::new(),
                inbound: BytesMut::new(),
                bytes_written: 0,
                bytes_sent: 0,
                bytes_received: 0,
                session_closed: false,
            }),
            commands,
            dispatcher,
        })
    }

    /// Pending → Open.
    pub(crate) fn open(&self) {
        let mut buffers = self.buffers.lock();
        if buffers.state == StreamState::Pending {
            buffers.state = StreamState::Open;
        }
    }

    /// Wrap in the public handle matching the direction.
    pub(crate) fn ready_stream(self: &Arc<Self>) -> ReadyStream {
        match self.direction {
            StreamDirection::Bidirectional => ReadyStream::Bidirectional(BidirectionalStream {
                core: Arc::clone(self),
            }),
            StreamDirection::Unidirectional => ReadyStream::Unidirectional(SendStream {
                core: Arc::clone(self),
            }),
        }
    }

    fn state(&self) -> StreamState {
        self.buffers.lock().state
    }

    fn write(&self, data: &[u8], length: usize) -> Result<usize> {
        if length > data.len() {
            return Err(WebTransportError::InvalidArgument(format!(
                "length {length} exceeds buffer of {} bytes",
                data.len()
            )));
        }

        {
            let mut buffers = self.buffers.lock();
            if buffers.state != StreamState::Open {
                return Err(buffers.released_error().into());
            }
            if length == 0 {
                return Ok(0);
            }
            buffers.outbound.extend_from_slice(&data[..length]);
            buffers.bytes_written += length as u64;
        }

        trace!(stream_id = %self.id, length, "queued");
        // The driver only goes away after releasing this stream.
        let _ = self.commands.send(Command::DataQueued);
        Ok(length)
    }

    fn stats(&self, callback: Box<dyn SendStreamStatsCallback>) {
        let result = {
            let buffers = self.buffers.lock();
            if buffers.state.is_released() {
                Err(StreamError::StatsUnavailable)
            } else {
                Ok(SendStreamStats {
                    bytes_written: buffers.bytes_written,
                    bytes_sent: buffers.bytes_sent,
                })
            }
        };
        self.dispatcher.stats(callback, result);
    }

    fn close(&self) {
        {
            let mut buffers = self.buffers.lock();
            if buffers.state.is_released() {
                return;
            }
            buffers.state = StreamState::Closed;
            buffers.outbound.clear();
            buffers.inbound.clear();
        }
        let _ = self.commands.send(Command::FinishStream(self.id));
    }

    fn read(&self, buf: &mut [u8]) -> std::result::Result<usize, StreamError> {
        let mut buffers = self.buffers.lock();
        if buffers.state.is_released() {
            return Err(buffers.released_error());
        }
        let n = buf.len().min(buffers.inbound.len());
        buf[..n].copy_from_slice(&buffers.inbound[..n]);
        buffers.inbound.advance(n);
        Ok(n)
    }

    fn available(&self) -> usize {
        self.buffers.lock().inbound.len()
    }

    fn bytes_received(&self) -> u64 {
        self.buffers.lock().bytes_received
    }

    // Driver side.

    /// Take up to `max` queued bytes for transmission.
    pub(crate) fn take_chunk(&self, max: usize) -> Option<Bytes> {
        let mut buffers = self.buffers.lock();
        if buffers.state != StreamState::Open || buffers.outbound.is_empty() {
            return None;
        }
        let n = max.min(buffers.outbound.len());
        Some(buffers.outbound.split_to(n).freeze())
    }

    pub(crate) fn has_outbound(&self) -> bool {
        let buffers = self.buffers.lock();
        buffers.state == StreamState::Open && !buffers.outbound.is_empty()
    }

    pub(crate) fn on_chunk_sent(&self, len: usize) {
        self.buffers.lock().bytes_sent += len as u64;
    }

    /// The peer connection failed to take a chunk.
    pub(crate) fn fail(&self) {
        let mut buffers = self.buffers.lock();
        if !buffers.state.is_released() {
            buffers.state = StreamState::Errored;
        }
        buffers.outbound.clear();
        buffers.inbound.clear();
    }

    pub(crate) fn push_inbound(&self, data: &[u8]) {
        let mut buffers = self.buffers.lock();
        if buffers.state != StreamState::Open {
            return;
        }
        buffers.inbound.extend_from_slice(data);
        buffers.bytes_received += data.len() as u64;
    }

    /// Session teardown. Streams with unsent bytes end Errored.
    pub(crate) fn release(&self) -> StreamState {
        let mut buffers = self.buffers.lock();
        if !buffers.state.is_released() {
            buffers.state = if buffers.outbound.is_empty() {
                StreamState::Closed
            } else {
                StreamState::Errored
            };
            buffers.session_closed = true;
        }
        buffers.outbound.clear();
        buffers.inbound.clear();
        buffers.state
    }
}

/// Weak handles to every stream of one session.
///
/// Shared by the session handle and the driver so `close_session` can
/// release streams before returning.
#[derive(Debug, Default)]
pub(crate) struct StreamTable {
    inner: Mutex<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    streams: Vec<Weak<StreamCore>>,
    closed: bool,
}

impl StreamTable {
    /// Track a new stream. Returns `false` once the table is closed; the
    /// stream is released in that case.
    pub(crate) fn track(&self, core: &Arc<StreamCore>) -> bool {
        {
            let mut inner = self.inner.lock();
            if !inner.closed {
                inner.streams.retain(|stream| stream.strong_count() > 0);
                inner.streams.push(Arc::downgrade(core));
                return true;
            }
        }
        core.release();
        false
    }

    /// Close the table and release every live stream.
    pub(crate) fn release_all(&self) {
        let streams = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.streams)
        };
        for stream in streams.iter().filter_map(Weak::upgrade) {
            stream.release();
        }
    }
}

/// Send-only stream.
#[derive(Debug, Clone)]
pub struct SendStream {
    core: Arc<StreamCore>,
}

impl SendStream {
    /// Stream identifier.
    pub fn id(&self) -> StreamId {
        self.core.id
    }

    /// Current stream state.
    pub fn state(&self) -> StreamState {
        self.core.state()
    }

    /// Queue the first `length` bytes of `data` for sending.
    ///
    /// Returns the number of bytes accepted. Fails with `InvalidArgument`
    /// if `length` exceeds `data`, `StreamClosed` after [`close`](Self::close),
    /// or `SessionClosed` once the owning session has closed.
    pub fn write(&self, data: &[u8], length: usize) -> Result<usize> {
        self.core.write(data, length)
    }

    /// Request a snapshot of the send counters.
    pub fn get_send_stream_stats(&self, callback: impl SendStreamStatsCallback) {
        self.core.stats(Box::new(callback));
    }

    /// Finish the stream and release its buffers. Idempotent.
    pub fn close(&self) {
        self.core.close();
    }
}

/// Stream carrying bytes both ways.
///
/// The write side behaves like [`SendStream`]; bytes from the peer are
/// buffered until [`read`](Self::read).
#[derive(Debug, Clone)]
pub struct BidirectionalStream {
    core: Arc<StreamCore>,
}

impl BidirectionalStream {
    /// Stream identifier.
    pub fn id(&self) -> StreamId {
        self.core.id
    }

    /// Current stream state.
    pub fn state(&self) -> StreamState {
        self.core.state()
    }

    /// See [`SendStream::write`].
    pub fn write(&self, data: &[u8], length: usize) -> Result<usize> {
        self.core.write(data, length)
    }

    /// Copy buffered peer bytes into `buf`. Returns 0 when nothing is
    /// buffered.
    pub fn read(&self, buf: &mut [u8]) -> std::result::Result<usize, StreamError> {
        self.core.read(buf)
    }

    /// Bytes buffered for `read`.
    pub fn available(&self) -> usize {
        self.core.available()
    }

    /// Total bytes received from the peer.
    pub fn bytes_received(&self) -> u64 {
        self.core.bytes_received()
    }

    /// See [`SendStream::get_send_stream_stats`].
    pub fn get_send_stream_stats(&self, callback: impl SendStreamStatsCallback) {
        self.core.stats(Box::new(callback));
    }

    /// See [`SendStream::close`].
    pub fn close(&self) {
        self.core.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Handle;

    fn open_core(direction: StreamDirection) -> (Arc<StreamCore>, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = StreamCore::new(
            StreamId::client(direction, 0),
            direction,
            tx,
            Dispatcher::spawn(&Handle::current()),
        );
        core.open();
        (core, rx)
    }

    #[tokio::test]
    async fn test_write_rejects_overlong_length() {
        let (core, _rx) = open_core(StreamDirection::Unidirectional);
        assert!(matches!(
            core.write(b"abc", 4),
            Err(WebTransportError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_write_queues_prefix_and_notifies() {
        let (core, mut rx) = open_core(StreamDirection::Unidirectional);
        assert_eq!(core.write(b"123456", 4).unwrap(), 4);
        assert!(matches!(rx.try_recv(), Ok(Command::DataQueued)));

        let chunk = core.take_chunk(3).unwrap();
        assert_eq!(&chunk[..], b"123");
        core.on_chunk_sent(chunk.len());
        assert!(core.has_outbound());
        assert_eq!(&core.take_chunk(1200).unwrap()[..], b"4");
        assert!(core.take_chunk(1200).is_none());
    }

    #[tokio::test]
    async fn test_zero_length_write() {
        let (core, mut rx) = open_core(StreamDirection::Unidirectional);
        assert_eq!(core.write(b"", 0).unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_writes() {
        let (core, mut rx) = open_core(StreamDirection::Unidirectional);
        core.close();
        core.close();
        assert!(matches!(rx.try_recv(), Ok(Command::FinishStream(_))));
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            core.write(b"x", 1),
            Err(WebTransportError::Stream(StreamError::StreamClosed))
        ));
    }

    #[tokio::test]
    async fn test_release_with_pending_bytes_errors() {
        let (core, _rx) = open_core(StreamDirection::Unidirectional);
        core.write(b"abc", 3).unwrap();
        assert_eq!(core.release(), StreamState::Errored);

        let (core, _rx) = open_core(StreamDirection::Unidirectional);
        assert_eq!(core.release(), StreamState::Closed);
    }

    #[tokio::test]
    async fn test_read_inbound() {
        let (core, _rx) = open_core(StreamDirection::Bidirectional);
        core.push_inbound(b"hello");

        let mut buf = [0u8; 3];
        assert_eq!(core.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(core.available(), 2);
        assert_eq!(core.bytes_received(), 5);

        core.release();
        assert_eq!(core.read(&mut buf), Err(StreamError::SessionClosed));
    }

    #[tokio::test]
    async fn test_table_release_all() {
        let table = StreamTable::default();
        let (idle, _rx) = open_core(StreamDirection::Unidirectional);
        let (busy, _rx2) = open_core(StreamDirection::Bidirectional);
        assert!(table.track(&idle));
        assert!(table.track(&busy));
        busy.write(b"abc", 3).unwrap();

        table.release_all();
        assert_eq!(idle.state(), StreamState::Closed);
        assert_eq!(busy.state(), StreamState::Errored);
        assert!(matches!(
            idle.write(b"x", 1),
            Err(WebTransportError::Stream(StreamError::SessionClosed))
        ));
    }

    #[tokio::test]
    async fn test_table_refuses_after_release() {
        let table = StreamTable::default();
        table.release_all();

        let (core, _rx) = open_core(StreamDirection::Unidirectional);
        assert!(!table.track(&core));
        assert!(core.state().is_released());
    }
}
