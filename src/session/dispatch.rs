//! Per-session event dispatch.
//!
//! Every listener callback of a session is posted to one FIFO queue and run
//! by a dedicated task, so callbacks arrive in the order their causes
//! happened and never run on the caller's stack.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::listener::{SendStreamStatsCallback, SessionEventListener, StatsEvent, StreamCallback};
use super::stream::{BidirectionalStream, SendStream};
use crate::core::{SessionId, StreamError};

/// A stream handed to `StreamCallback`.
pub(crate) enum ReadyStream {
    Bidirectional(BidirectionalStream),
    Unidirectional(SendStream),
}

/// One queued callback.
pub(crate) enum Dispatch {
    SessionReady {
        listener: Arc<dyn SessionEventListener>,
        session_id: SessionId,
    },
    SessionClosed {
        listener: Arc<dyn SessionEventListener>,
        error_code: u32,
        reason: String,
    },
    StreamReady {
        callback: Box<dyn StreamCallback>,
        stream: ReadyStream,
    },
    StreamError {
        callback: Box<dyn StreamCallback>,
        error: StreamError,
    },
    Stats {
        callback: Box<dyn SendStreamStatsCallback>,
        result: StatsEvent,
    },
}

/// Sending half of a session's dispatch queue.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl Dispatcher {
    /// Spawn the dispatch task on `runtime`.
    ///
    /// The task exits once every `Dispatcher` clone is dropped and the
    /// queue is drained.
    pub(crate) fn spawn(runtime: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run(rx));
        Self { tx }
    }

    fn post(&self, item: Dispatch) {
        if self.tx.send(item).is_err() {
            // Only happens while the runtime shuts down.
            debug!("dispatch task gone, dropping callback");
        }
    }

    pub(crate) fn session_ready(&self, listener: Arc<dyn SessionEventListener>, session_id: SessionId) {
        self.post(Dispatch::SessionReady {
            listener,
            session_id,
        });
    }

    pub(crate) fn session_closed(
        &self,
        listener: Arc<dyn SessionEventListener>,
        error_code: u32,
        reason: String,
    ) {
        self.post(Dispatch::SessionClosed {
            listener,
            error_code,
            reason,
        });
    }

    pub(crate) fn stream_ready(&self, callback: Box<dyn StreamCallback>, stream: ReadyStream) {
        self.post(Dispatch::StreamReady { callback, stream });
    }

    pub(crate) fn stream_error(&self, callback: Box<dyn StreamCallback>, error: StreamError) {
        self.post(Dispatch::StreamError { callback, error });
    }

    pub(crate) fn stats(&self, callback: Box<dyn SendStreamStatsCallback>, result: StatsEvent) {
        self.post(Dispatch::Stats { callback, result });
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Dispatch>) {
    let mut closed = false;

    while let Some(item) = rx.recv().await {
        match item {
            Dispatch::SessionReady {
                listener,
                session_id,
            } => {
                if closed {
                    debug!(%session_id, "ready after close, dropped");
                    continue;
                }
                trace!(%session_id, "on_session_ready");
                listener.on_session_ready(session_id);
            }
            Dispatch::SessionClosed {
                listener,
                error_code,
                reason,
            } => {
                if closed {
                    debug!(error_code, "second close, dropped");
                    continue;
                }
                closed = true;
                trace!(error_code, %reason, "on_session_closed");
                listener.on_session_closed(error_code, &reason);
            }
            Dispatch::StreamReady { callback, stream } => match stream {
                ReadyStream::Bidirectional(stream) => callback.on_bidirectional_stream_ready(stream),
                ReadyStream::Unidirectional(stream) => callback.on_unidirectional_stream_ready(stream),
            },
            Dispatch::StreamError { callback, error } => callback.on_error(error),
            Dispatch::Stats { callback, result } => match result {
                Ok(stats) => callback.on_stats_available(stats),
                Err(error) => callback.on_stats_error(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEvent;

    #[tokio::test]
    async fn test_close_is_terminal() {
        let dispatcher = Dispatcher::spawn(&Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        let listener: Arc<dyn SessionEventListener> = Arc::new(tx);

        dispatcher.session_ready(Arc::clone(&listener), SessionId::new(1));
        dispatcher.session_closed(Arc::clone(&listener), 0, "first".into());
        dispatcher.session_closed(Arc::clone(&listener), 1, "second".into());
        dispatcher.session_ready(Arc::clone(&listener), SessionId::new(1));
        drop(listener);
        drop(dispatcher);

        assert_eq!(rx.recv().await, Some(SessionEvent::Ready(SessionId::new(1))));
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Closed {
                error_code: 0,
                reason: "first".into(),
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_stats_delivered_in_order() {
        let dispatcher = Dispatcher::spawn(&Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel::<StatsEvent>();

        dispatcher.stats(Box::new(tx.clone()), Err(StreamError::StatsUnavailable));
        dispatcher.stats(Box::new(tx), Ok(Default::default()));

        assert_eq!(rx.recv().await, Some(Err(StreamError::StatsUnavailable)));
        assert_eq!(rx.recv().await, Some(Ok(Default::default())));
    }
}
