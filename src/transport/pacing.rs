//! Send pacing.
//!
//! Writes only fill stream buffers; the session driver drains them when the
//! pacer allows. This is why `bytes_sent` may lag `bytes_written`.

use std::time::Duration;

use tokio::time::Instant;

/// Pacing constants.
pub mod constants {
    use std::time::Duration;

    /// Minimum time between two sends on one session.
    pub const MIN_SEND_INTERVAL: Duration = Duration::from_millis(20);

    /// Wait after the first queued write before sending (batch rapid writes).
    pub const COLLECTION_INTERVAL: Duration = Duration::from_millis(8);
}

/// Action the pacer recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerAction {
    /// Send now.
    SendNow,
    /// Wait until the specified instant before sending.
    WaitUntil(Instant),
    /// Nothing queued.
    Idle,
}

/// Decides when the session may hand queued bytes to the peer.
///
/// The pacer ensures:
/// - a minimum interval between sends
/// - a collection interval so bursts of small writes leave together
#[derive(Debug, Clone)]
pub struct SendPacer {
    /// When we last sent.
    last_send: Option<Instant>,
    /// When the oldest unsent write was queued.
    queued_since: Option<Instant>,
    /// Whether any stream has buffered bytes.
    data_pending: bool,
    min_interval: Duration,
    collection_interval: Duration,
}

impl Default for SendPacer {
    fn default() -> Self {
        Self::new(constants::MIN_SEND_INTERVAL, constants::COLLECTION_INTERVAL)
    }
}

impl SendPacer {
    /// Create a pacer with explicit intervals.
    pub fn new(min_interval: Duration, collection_interval: Duration) -> Self {
        Self {
            last_send: None,
            queued_since: None,
            data_pending: false,
            min_interval,
            collection_interval,
        }
    }

    /// A stream buffered new bytes.
    pub fn on_data_queued(&mut self) {
        if self.queued_since.is_none() && !self.data_pending {
            self.queued_since = Some(Instant::now());
        }
        self.data_pending = true;
    }

    /// A send round finished. `more_pending` is true when some stream still
    /// holds unsent bytes.
    pub fn on_sent(&mut self, more_pending: bool) {
        self.last_send = Some(Instant::now());
        self.queued_since = None;
        self.data_pending = more_pending;
    }

    /// Forget pending work (session closing).
    pub fn clear(&mut self) {
        self.data_pending = false;
        self.queued_since = None;
    }

    /// Check if bytes are waiting to be sent.
    pub fn has_pending(&self) -> bool {
        self.data_pending
    }

    /// Determine what to do now.
    pub fn poll(&self) -> PacerAction {
        if !self.data_pending {
            return PacerAction::Idle;
        }

        let now = Instant::now();

        if let Some(last) = self.last_send {
            let next_allowed = last + self.min_interval;
            if now < next_allowed {
                return PacerAction::WaitUntil(next_allowed);
            }
        }

        if let Some(queued) = self.queued_since {
            let collection_end = queued + self.collection_interval;
            if now < collection_end {
                return PacerAction::WaitUntil(collection_end);
            }
        }

        PacerAction::SendNow
    }

    /// Instant the driver should wake at, if any work is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.poll() {
            PacerAction::Idle => None,
            PacerAction::SendNow => Some(Instant::now()),
            PacerAction::WaitUntil(at) => Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_initial_state() {
        let pacer = SendPacer::default();
        assert_eq!(pacer.poll(), PacerAction::Idle);
        assert_eq!(pacer.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_collection_interval() {
        let mut pacer = SendPacer::default();
        pacer.on_data_queued();

        // Should wait for collection interval
        match pacer.poll() {
            PacerAction::WaitUntil(_) => {}
            other => panic!("Expected WaitUntil, got {:?}", other),
        }

        tokio::time::advance(constants::COLLECTION_INTERVAL).await;
        assert_eq!(pacer.poll(), PacerAction::SendNow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_min_interval() {
        let mut pacer = SendPacer::default();
        pacer.on_data_queued();
        tokio::time::advance(constants::COLLECTION_INTERVAL).await;
        assert_eq!(pacer.poll(), PacerAction::SendNow);

        pacer.on_sent(true);
        let sent_at = Instant::now();
        assert_eq!(
            pacer.poll(),
            PacerAction::WaitUntil(sent_at + constants::MIN_SEND_INTERVAL)
        );

        tokio::time::advance(constants::MIN_SEND_INTERVAL).await;
        assert_eq!(pacer.poll(), PacerAction::SendNow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_sent_clears_state() {
        let mut pacer = SendPacer::default();
        pacer.on_data_queued();
        tokio::time::advance(constants::COLLECTION_INTERVAL).await;

        pacer.on_sent(false);
        assert_eq!(pacer.poll(), PacerAction::Idle);
        assert!(!pacer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_starts_at_first_write() {
        let mut pacer = SendPacer::default();
        pacer.on_data_queued();
        let first = Instant::now();

        tokio::time::advance(Duration::from_millis(5)).await;
        pacer.on_data_queued();

        assert_eq!(
            pacer.poll(),
            PacerAction::WaitUntil(first + constants::COLLECTION_INTERVAL)
        );
    }

    #[test]
    fn test_clear() {
        let mut pacer = SendPacer::new(Duration::ZERO, Duration::ZERO);
        pacer.on_data_queued();
        assert_eq!(pacer.poll(), PacerAction::SendNow);

        pacer.clear();
        assert_eq!(pacer.poll(), PacerAction::Idle);
    }
}
