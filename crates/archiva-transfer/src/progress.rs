//! Transfer progress reporting
//!
//! Proxies report through [`ProgressReporter`], which throttles `progressed`
//! callbacks to a byte threshold and guarantees exactly one terminal callback
//! per transfer. Listeners may be invoked from background tasks, hence the
//! `Send + Sync` bound.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Receiver of transfer progress notifications.
pub trait TransferProgressListener: Send + Sync {
    /// Cumulative bytes moved so far.
    fn progressed(&self, bytes_transferred: u64);

    /// The transfer finished; `bytes_transferred` is the final size.
    fn completed(&self, bytes_transferred: u64);

    fn failed(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progressed(u64),
    Completed(u64),
    Failed(String),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progressed(_))
    }
}

/// Listener that forwards every notification into a channel.
///
/// Events are dropped once the receiving side has gone away.
pub struct ChannelProgressListener {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressListener {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }

    fn send(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Progress receiver dropped, discarding event");
        }
    }
}

impl TransferProgressListener for ChannelProgressListener {
    fn progressed(&self, bytes_transferred: u64) {
        self.send(ProgressEvent::Progressed(bytes_transferred));
    }

    fn completed(&self, bytes_transferred: u64) {
        self.send(ProgressEvent::Completed(bytes_transferred));
    }

    fn failed(&self, message: &str) {
        self.send(ProgressEvent::Failed(message.to_string()));
    }
}

/// Per-transfer reporting state.
pub struct ProgressReporter {
    listener: Option<Arc<dyn TransferProgressListener>>,
    reporting_rate: u64,
    transferred: Arc<AtomicU64>,
    last_reported: AtomicU64,
    finished: AtomicBool,
}

impl ProgressReporter {
    pub fn new(listener: Option<Arc<dyn TransferProgressListener>>, reporting_rate: u64) -> Self {
        Self::with_counter(listener, reporting_rate, Arc::new(AtomicU64::new(0)))
    }

    /// Reporter that accumulates into a counter shared with a tracker entry.
    pub fn with_counter(
        listener: Option<Arc<dyn TransferProgressListener>>,
        reporting_rate: u64,
        transferred: Arc<AtomicU64>,
    ) -> Self {
        Self {
            listener,
            reporting_rate: reporting_rate.max(1),
            transferred,
            last_reported: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    /// Account for `bytes` more bytes moved.
    ///
    /// No `progressed` callback follows a terminal one.
    pub fn advance(&self, bytes: u64) {
        if self.is_finished() {
            return;
        }
        let total = self.transferred.fetch_add(bytes, Ordering::SeqCst) + bytes;
        let last = self.last_reported.load(Ordering::SeqCst);
        if total.saturating_sub(last) < self.reporting_rate {
            return;
        }
        // Only the caller that moves the mark reports this crossing.
        if self
            .last_reported
            .compare_exchange(last, total, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(ref listener) = self.listener {
                listener.progressed(total);
            }
        }
    }

    /// Emit `completed` unless a terminal callback was already sent.
    pub fn complete(&self) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(ref listener) = self.listener {
            listener.completed(self.transferred());
        }
        true
    }

    /// Emit `failed` unless a terminal callback was already sent.
    pub fn fail(&self, message: &str) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(ref listener) = self.listener {
            listener.failed(message);
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(receiver: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_progress_is_throttled_to_reporting_rate() {
        let (listener, mut receiver) = ChannelProgressListener::channel();
        let reporter = ProgressReporter::new(Some(listener), 100);

        reporter.advance(40);
        reporter.advance(40);
        assert!(drain(&mut receiver).is_empty());

        reporter.advance(40);
        assert_eq!(drain(&mut receiver), vec![ProgressEvent::Progressed(120)]);

        // Next report needs another 100 bytes past 120.
        reporter.advance(90);
        assert!(drain(&mut receiver).is_empty());
        reporter.advance(10);
        assert_eq!(drain(&mut receiver), vec![ProgressEvent::Progressed(220)]);
    }

    #[test]
    fn test_exactly_one_terminal_callback() {
        let (listener, mut receiver) = ChannelProgressListener::channel();
        let reporter = ProgressReporter::new(Some(listener), 1_000);

        reporter.advance(10);
        assert!(reporter.complete());
        assert!(!reporter.fail("late failure"));
        assert!(!reporter.complete());

        let events = drain(&mut receiver);
        assert_eq!(events, vec![ProgressEvent::Completed(10)]);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_failure_wins_when_first() {
        let (listener, mut receiver) = ChannelProgressListener::channel();
        let reporter = ProgressReporter::new(Some(listener), 1_000);

        assert!(reporter.fail("connection reset"));
        assert!(!reporter.complete());
        assert_eq!(
            drain(&mut receiver),
            vec![ProgressEvent::Failed("connection reset".to_string())]
        );
    }

    #[test]
    fn test_shared_counter_sees_progress() {
        let counter = Arc::new(AtomicU64::new(0));
        let reporter = ProgressReporter::with_counter(None, 10, counter.clone());
        reporter.advance(7);
        reporter.advance(8);
        assert_eq!(counter.load(Ordering::SeqCst), 15);
        assert!(reporter.complete());
    }

    #[test]
    fn test_no_progress_after_terminal_callback() {
        let (listener, mut receiver) = ChannelProgressListener::channel();
        let reporter = ProgressReporter::new(Some(listener), 10);

        reporter.advance(10);
        assert!(reporter.fail("source closed"));
        reporter.advance(50);

        assert_eq!(
            drain(&mut receiver),
            vec![
                ProgressEvent::Progressed(10),
                ProgressEvent::Failed("source closed".to_string())
            ]
        );
    }

    #[test]
    fn test_dropped_receiver_is_tolerated() {
        let (listener, receiver) = ChannelProgressListener::channel();
        drop(receiver);
        let reporter = ProgressReporter::new(Some(listener), 1);
        reporter.advance(5);
        assert!(reporter.complete());
    }
}
