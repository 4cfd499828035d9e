//! Size-bounded batching of outbound events.
//!
//! Delivery is best effort. A batch the sink does not acknowledge with `"OK"`
//! stays buffered and rides along with the next flush attempt; nothing is
//! retried on a schedule, and whatever is still buffered when the process exits
//! is lost.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::SinkError;
use crate::ports::EventSink;
use crate::types::{EventRecord, DEFAULT_BATCH_THRESHOLD};

/// The only response body the sink uses to acknowledge a batch.
pub const SINK_ACK: &str = "OK";

/// Result of a [`BatchDispatcher::post`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was sent; the buffer holds `pending` events.
    Buffered { pending: usize },
    /// A batch of `count` events was acknowledged and the buffer cleared.
    Delivered { count: usize },
    /// The sink answered with something other than `"OK"`; all `pending`
    /// events remain buffered.
    Rejected { pending: usize },
}

/// Accumulates events and ships them to an [`EventSink`] in batches.
pub struct BatchDispatcher {
    sink: Arc<dyn EventSink>,
    buffer: Vec<EventRecord>,
    threshold: usize,
}

impl BatchDispatcher {
    /// Creates a dispatcher with the default threshold of
    /// [`DEFAULT_BATCH_THRESHOLD`] events.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_threshold(sink, DEFAULT_BATCH_THRESHOLD)
    }

    /// Creates a dispatcher that flushes once more than `threshold` events are
    /// buffered.
    pub fn with_threshold(sink: Arc<dyn EventSink>, threshold: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            threshold,
        }
    }

    /// Number of events waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `event` (if any) and sends the buffer when it has grown past the
    /// threshold, or when this call is a flush request (`None`) and the buffer
    /// is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] only when the sink cannot be reached. A rejection
    /// is reported as [`DispatchOutcome::Rejected`].
    pub async fn post(&mut self, event: Option<EventRecord>) -> Result<DispatchOutcome, SinkError> {
        let flush_requested = event.is_none();
        if let Some(event) = event {
            self.buffer.push(event);
        }

        let over_threshold = self.buffer.len() > self.threshold;
        if !(over_threshold || (flush_requested && !self.buffer.is_empty())) {
            return Ok(DispatchOutcome::Buffered {
                pending: self.buffer.len(),
            });
        }

        let body = self.sink.deliver(&self.buffer).await?;
        if body == SINK_ACK {
            let count = self.buffer.len();
            self.buffer.clear();
            debug!(events = count, "batch delivered");
            Ok(DispatchOutcome::Delivered { count })
        } else {
            warn!(
                pending = self.buffer.len(),
                response = %body,
                "sink rejected batch; events stay buffered"
            );
            Ok(DispatchOutcome::Rejected {
                pending: self.buffer.len(),
            })
        }
    }

    /// Buffers one event, flushing if the threshold is exceeded.
    pub async fn enqueue(&mut self, event: EventRecord) -> Result<DispatchOutcome, SinkError> {
        self.post(Some(event)).await
    }

    /// Sends whatever is buffered.
    pub async fn flush(&mut self) -> Result<DispatchOutcome, SinkError> {
        self.post(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{event, RecordingSink};

    #[tokio::test]
    async fn test_events_below_threshold_are_only_buffered() {
        let sink = Arc::new(RecordingSink::accepting());
        let mut dispatcher = BatchDispatcher::new(sink.clone());

        for i in 0..100 {
            let outcome = dispatcher.enqueue(event(i)).await.unwrap();
            assert_eq!(outcome, DispatchOutcome::Buffered { pending: i + 1 });
        }
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_triggers_one_delivery_of_all_events() {
        let sink = Arc::new(RecordingSink::accepting());
        let mut dispatcher = BatchDispatcher::new(sink.clone());

        let mut outcomes = Vec::new();
        for i in 0..101 {
            outcomes.push(dispatcher.enqueue(event(i)).await.unwrap());
        }

        assert_eq!(outcomes.last(), Some(&DispatchOutcome::Delivered { count: 101 }));
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 101);
        assert_eq!(batches[0][0], event(0));
        assert_eq!(batches[0][100], event(100));
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn test_rejected_threshold_batch_leaves_buffer_unchanged() {
        let sink = Arc::new(RecordingSink::responding("ERROR"));
        let mut dispatcher = BatchDispatcher::new(sink.clone());

        for i in 0..100 {
            dispatcher.enqueue(event(i)).await.unwrap();
        }
        let outcome = dispatcher.enqueue(event(100)).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Rejected { pending: 101 });
        assert_eq!(sink.batches().len(), 1);
        assert_eq!(dispatcher.pending(), 101);
    }

    #[tokio::test]
    async fn test_flush_on_empty_buffer_does_not_call_sink() {
        let sink = Arc::new(RecordingSink::accepting());
        let mut dispatcher = BatchDispatcher::new(sink.clone());

        assert_eq!(
            dispatcher.flush().await.unwrap(),
            DispatchOutcome::Buffered { pending: 0 }
        );
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn test_flush_sends_partial_batch() {
        let sink = Arc::new(RecordingSink::accepting());
        let mut dispatcher = BatchDispatcher::new(sink.clone());

        dispatcher.enqueue(event(0)).await.unwrap();
        dispatcher.enqueue(event(1)).await.unwrap();

        assert_eq!(
            dispatcher.flush().await.unwrap(),
            DispatchOutcome::Delivered { count: 2 }
        );
        assert_eq!(sink.batches(), vec![vec![event(0), event(1)]]);
    }

    /// Delivery is at most best effort: a rejected batch is neither dropped nor
    /// retried on its own, it is simply resent with the next flush.
    #[tokio::test]
    async fn test_rejected_events_ride_along_with_next_flush() {
        let sink = Arc::new(RecordingSink::scripted(["busy", "OK"]));
        let mut dispatcher = BatchDispatcher::new(sink.clone());

        dispatcher.enqueue(event(0)).await.unwrap();
        assert_eq!(
            dispatcher.flush().await.unwrap(),
            DispatchOutcome::Rejected { pending: 1 }
        );

        dispatcher.enqueue(event(1)).await.unwrap();
        assert_eq!(
            dispatcher.flush().await.unwrap(),
            DispatchOutcome::Delivered { count: 2 }
        );
        assert_eq!(
            sink.batches(),
            vec![vec![event(0)], vec![event(0), event(1)]]
        );
    }

    #[tokio::test]
    async fn test_ack_must_match_exactly() {
        let sink = Arc::new(RecordingSink::responding("OK\n"));
        let mut dispatcher = BatchDispatcher::new(sink);

        dispatcher.enqueue(event(0)).await.unwrap();
        assert_eq!(
            dispatcher.flush().await.unwrap(),
            DispatchOutcome::Rejected { pending: 1 }
        );
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_an_error_and_keeps_buffer() {
        let sink = Arc::new(RecordingSink::unreachable());
        let mut dispatcher = BatchDispatcher::new(sink);

        dispatcher.enqueue(event(0)).await.unwrap();
        assert!(dispatcher.flush().await.is_err());
        assert_eq!(dispatcher.pending(), 1);
    }
}
