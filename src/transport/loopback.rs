//! In-process connector emulating the WebTransport test server.
//!
//! Routes by request path:
//!
//! | path               | behaviour                                      |
//! |--------------------|------------------------------------------------|
//! | `/success`         | accept                                         |
//! | `/reject`          | reject with status 404                         |
//! | `/closeafter<N>ms` | accept, then close from the peer after N ms    |
//! | `/drop`            | accept, then drop the connection               |
//! | `/fail`            | fail with an I/O error before any status       |
//! | `/hang`            | never answer                                   |
//! | anything else      | reject with status 404                         |
//!
//! Bytes written on bidirectional streams are echoed back. Sending on or
//! finishing a stream the peer never opened fails with `UnknownStream`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::connector::{ConnectRequest, Connector, Established, PeerConnection, PeerEvent};
use super::error::{TransportError, TransportResult};
use crate::core::{StreamDirection, StreamId};

/// Status returned for rejected handshakes.
pub const REJECT_STATUS: u16 = 404;

/// What the loopback peer observed for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopbackRecord {
    /// The handshake request.
    pub request: Option<ConnectRequest>,
    /// Bytes received per stream.
    pub received: HashMap<StreamId, Vec<u8>>,
    /// Streams the client finished.
    pub finished: HashSet<StreamId>,
    /// Close code and reason sent by the client.
    pub close: Option<(u32, String)>,
}

impl LoopbackRecord {
    /// Bytes received on `stream_id` (empty if none).
    pub fn received_on(&self, stream_id: StreamId) -> &[u8] {
        self.received.get(&stream_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Default)]
struct Shared {
    handshakes: AtomicU64,
    refuse_streams: AtomicBool,
    records: Mutex<Vec<Arc<Mutex<LoopbackRecord>>>>,
}

/// Loopback [`Connector`].
#[derive(Debug, Clone, Default)]
pub struct LoopbackConnector {
    shared: Arc<Shared>,
    handshake_delay: Duration,
}

impl LoopbackConnector {
    /// Create a connector answering handshakes immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every handshake answer by `delay`.
    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }

    /// Make the peer refuse (or accept again) new streams.
    pub fn refuse_streams(&self, refuse: bool) {
        self.shared.refuse_streams.store(refuse, Ordering::SeqCst);
    }

    /// Number of handshakes attempted.
    pub fn handshake_count(&self) -> u64 {
        self.shared.handshakes.load(Ordering::SeqCst)
    }

    /// Snapshot of the `index`-th accepted session.
    pub fn record(&self, index: usize) -> Option<LoopbackRecord> {
        self.shared.records.lock().get(index).map(|r| r.lock().clone())
    }

    /// Snapshot of the most recently accepted session.
    pub fn last_record(&self) -> Option<LoopbackRecord> {
        self.shared.records.lock().last().map(|r| r.lock().clone())
    }

    fn accept(&self, request: ConnectRequest, keep_events: bool) -> (Established, mpsc::UnboundedSender<PeerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let record = Arc::new(Mutex::new(LoopbackRecord {
            request: Some(request),
            ..LoopbackRecord::default()
        }));
        self.shared.records.lock().push(Arc::clone(&record));

        let connection = LoopbackConnection {
            shared: Arc::clone(&self.shared),
            record,
            events: keep_events.then(|| events_tx.clone()),
            next_bidi: AtomicU64::new(0),
            next_uni: AtomicU64::new(0),
            opened: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        };

        let established = Established {
            connection: Box::new(connection),
            events: events_rx,
        };
        (established, events_tx)
    }
}

fn close_after(path: &str) -> Option<Duration> {
    path.strip_prefix("/closeafter")?
        .strip_suffix("ms")?
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, request: ConnectRequest) -> TransportResult<Established> {
        self.shared.handshakes.fetch_add(1, Ordering::SeqCst);
        debug!(endpoint = %request.endpoint, "loopback handshake");

        if !self.handshake_delay.is_zero() {
            tokio::time::sleep(self.handshake_delay).await;
        }

        let path = request.endpoint.path().to_string();
        match path.as_str() {
            "/success" => Ok(self.accept(request, true).0),
            "/hang" => std::future::pending().await,
            "/fail" => Err(TransportError::Io("connection refused".into())),
            "/drop" => {
                let (established, events_tx) = self.accept(request, false);
                drop(events_tx);
                Ok(established)
            }
            other => match close_after(other) {
                Some(delay) => {
                    let (established, events_tx) = self.accept(request, true);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = events_tx.send(PeerEvent::SessionClosed {
                            error_code: 0,
                            reason: String::new(),
                        });
                    });
                    Ok(established)
                }
                None => Err(TransportError::HandshakeRejected {
                    status: REJECT_STATUS,
                }),
            },
        }
    }
}

struct LoopbackConnection {
    shared: Arc<Shared>,
    record: Arc<Mutex<LoopbackRecord>>,
    events: Option<mpsc::UnboundedSender<PeerEvent>>,
    next_bidi: AtomicU64,
    next_uni: AtomicU64,
    opened: Mutex<HashSet<StreamId>>,
    closed: AtomicBool,
}

impl LoopbackConnection {
    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_known(&self, stream_id: StreamId) -> TransportResult<()> {
        if self.opened.lock().contains(&stream_id) {
            Ok(())
        } else {
            Err(TransportError::UnknownStream(stream_id.as_u64()))
        }
    }
}

#[async_trait]
impl PeerConnection for LoopbackConnection {
    async fn open_stream(&self, direction: StreamDirection) -> TransportResult<StreamId> {
        self.ensure_open()?;
        if self.shared.refuse_streams.load(Ordering::SeqCst) {
            return Err(TransportError::StreamRefused("peer refuses new streams".into()));
        }
        let counter = match direction {
            StreamDirection::Bidirectional => &self.next_bidi,
            StreamDirection::Unidirectional => &self.next_uni,
        };
        let stream_id = StreamId::client(direction, counter.fetch_add(1, Ordering::SeqCst));
        self.opened.lock().insert(stream_id);
        Ok(stream_id)
    }

    async fn send(&self, stream_id: StreamId, data: Bytes) -> TransportResult<()> {
        self.ensure_open()?;
        self.ensure_known(stream_id)?;
        trace!(%stream_id, len = data.len(), "loopback received");
        self.record
            .lock()
            .received
            .entry(stream_id)
            .or_default()
            .extend_from_slice(&data);

        if stream_id.direction() == StreamDirection::Bidirectional
            && let Some(events) = &self.events
        {
            let _ = events.send(PeerEvent::StreamData { stream_id, data });
        }
        Ok(())
    }

    async fn finish_stream(&self, stream_id: StreamId) -> TransportResult<()> {
        self.ensure_open()?;
        self.ensure_known(stream_id)?;
        self.record.lock().finished.insert(stream_id);
        Ok(())
    }

    async fn close(&self, error_code: u32, reason: &str) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.record.lock().close = Some((error_code, reason.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SecurityFlags;
    use crate::transport::Endpoint;

    fn request(path: &str) -> ConnectRequest {
        ConnectRequest {
            endpoint: Endpoint::parse(&format!("https://foo.example.com:4433{path}")).unwrap(),
            origin: None,
            security_flags: SecurityFlags::NONE,
        }
    }

    #[test]
    fn test_close_after_parse() {
        assert_eq!(close_after("/closeafter0ms"), Some(Duration::ZERO));
        assert_eq!(close_after("/closeafter100ms"), Some(Duration::from_millis(100)));
        assert_eq!(close_after("/closeafterms"), None);
        assert_eq!(close_after("/success"), None);
    }

    #[tokio::test]
    async fn test_reject() {
        let connector = LoopbackConnector::new();
        let err = connector.connect(request("/reject")).await.unwrap_err();
        assert_eq!(err, TransportError::HandshakeRejected { status: 404 });
        assert_eq!(connector.handshake_count(), 1);
        assert!(connector.last_record().is_none());
    }

    #[tokio::test]
    async fn test_bidi_echo_and_record() {
        let connector = LoopbackConnector::new();
        let Established {
            connection,
            mut events,
        } = connector.connect(request("/success")).await.unwrap();

        let bidi = connection.open_stream(StreamDirection::Bidirectional).await.unwrap();
        let uni = connection.open_stream(StreamDirection::Unidirectional).await.unwrap();
        assert_eq!(bidi, StreamId::new(0));
        assert_eq!(uni, StreamId::new(2));

        connection.send(bidi, Bytes::from_static(b"ping")).await.unwrap();
        connection.send(uni, Bytes::from_static(b"123456")).await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(PeerEvent::StreamData {
                stream_id: bidi,
                data: Bytes::from_static(b"ping"),
            })
        );

        connection.close(0, "done").await;
        assert_eq!(
            connection.send(uni, Bytes::from_static(b"x")).await,
            Err(TransportError::Closed)
        );

        let record = connector.last_record().unwrap();
        assert_eq!(record.received_on(uni), b"123456");
        assert_eq!(record.close, Some((0, "done".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_after_emits_peer_close() {
        let connector = LoopbackConnector::new();
        let mut established = connector.connect(request("/closeafter100ms")).await.unwrap();
        assert_eq!(
            established.events.recv().await,
            Some(PeerEvent::SessionClosed {
                error_code: 0,
                reason: String::new(),
            })
        );
    }

    #[tokio::test]
    async fn test_io_failure() {
        let connector = LoopbackConnector::new();
        let err = connector.connect(request("/fail")).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
        assert_eq!(err.close_code(), crate::core::HANDSHAKE_FAILED_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let connector = LoopbackConnector::new();
        let established = connector.connect(request("/success")).await.unwrap();
        let stray = StreamId::client(StreamDirection::Unidirectional, 7);

        let err = established
            .connection
            .send(stray, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownStream(stray.as_u64()));
        assert!(!err.is_fatal());
        assert_eq!(
            established.connection.finish_stream(stray).await,
            Err(TransportError::UnknownStream(stray.as_u64()))
        );
        assert!(connector.last_record().unwrap().received.is_empty());
    }

    #[tokio::test]
    async fn test_drop_closes_events() {
        let connector = LoopbackConnector::new();
        let mut established = connector.connect(request("/drop")).await.unwrap();
        assert_eq!(established.events.recv().await, None);
    }

    #[tokio::test]
    async fn test_refuse_streams() {
        let connector = LoopbackConnector::new();
        let established = connector.connect(request("/success")).await.unwrap();
        connector.refuse_streams(true);
        assert!(matches!(
            established
                .connection
                .open_stream(StreamDirection::Unidirectional)
                .await,
            Err(TransportError::StreamRefused(_))
        ));
    }
}
