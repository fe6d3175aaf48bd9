//! Transfer progress accounting.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use tokio::time::Instant;
use tracing::trace;

use crate::constants::PROGRESS_INTERVAL;
use crate::error::FetchError;

/// Callback receiving progress events.
pub type ProgressCallback = Box<dyn FnMut(ProgressInfo) + Send>;

/// One progress event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressInfo {
    /// Declared total in bytes (0 when unknown).
    pub total: u64,
    /// Bytes since the previous event.
    pub delta: u64,
    /// Bytes so far.
    pub transferred: u64,
    /// `transferred / total * 100`.
    pub percent: f64,
    /// Average rate since the transfer started.
    pub bytes_per_second: u64,
}

/// Counters behind [`ProgressStream`].
///
/// Intermediate events are rate limited to one per [`PROGRESS_INTERVAL`] and
/// suppressed once more bytes than declared have arrived.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    start: Instant,
    total: u64,
    transferred: u64,
    delta: u64,
    next_update: Instant,
}

impl ProgressTracker {
    /// Starts tracking a transfer of `total` declared bytes.
    #[must_use]
    pub fn new(total: u64) -> Self {
        let start = Instant::now();
        Self {
            start,
            total,
            transferred: 0,
            delta: 0,
            next_update: start + PROGRESS_INTERVAL,
        }
    }

    /// Counts `len` bytes; returns an event when one is due.
    pub fn record(&mut self, len: u64) -> Option<ProgressInfo> {
        self.transferred += len;
        self.delta += len;
        if self.transferred > self.total {
            return None;
        }

        let now = Instant::now();
        if now < self.next_update {
            return None;
        }
        self.next_update = now + PROGRESS_INTERVAL;
        let info = ProgressInfo {
            total: self.total,
            delta: self.delta,
            transferred: self.transferred,
            percent: percent(self.transferred, self.total),
            bytes_per_second: bytes_per_second(self.transferred, now - self.start),
        };
        self.delta = 0;
        Some(info)
    }

    /// Final event: 100 percent, with the total raised to what actually arrived.
    pub fn finish(&mut self) -> ProgressInfo {
        let total = self.transferred.max(self.total);
        let info = ProgressInfo {
            total,
            delta: self.delta,
            transferred: total,
            percent: 100.0,
            bytes_per_second: bytes_per_second(self.transferred, self.start.elapsed()),
        };
        self.delta = 0;
        info
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(transferred: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    transferred as f64 / total as f64 * 100.0
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bytes_per_second(transferred: u64, elapsed: Duration) -> u64 {
    let seconds = elapsed.max(Duration::from_millis(1)).as_secs_f64();
    (transferred as f64 / seconds).round() as u64
}

/// Pass-through stream reporting progress for every chunk it forwards.
pub struct ProgressStream<S> {
    inner: S,
    tracker: ProgressTracker,
    callback: ProgressCallback,
    done: bool,
}

impl<S> ProgressStream<S> {
    /// Wraps `inner`, reporting against a declared `total`.
    pub fn new(inner: S, total: u64, callback: ProgressCallback) -> Self {
        Self {
            inner,
            tracker: ProgressTracker::new(total),
            callback,
            done: false,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, FetchError>> + Unpin,
{
    type Item = Result<Bytes, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
                if let Some(info) = this.tracker.record(len) {
                    trace!(transferred = info.transferred, total = info.total, "progress");
                    (this.callback)(info);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                this.done = true;
                (this.callback)(this.tracker.finish());
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::{Arc, Mutex};

    fn collector() -> (Arc<Mutex<Vec<ProgressInfo>>>, ProgressCallback) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, Box::new(move |info: ProgressInfo| sink.lock().unwrap().push(info)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_intermediate_event_before_interval() {
        let mut tracker = ProgressTracker::new(100);
        assert_eq!(tracker.record(10), None);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(tracker.record(10), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermediate_event_after_interval() {
        let mut tracker = ProgressTracker::new(100);
        assert_eq!(tracker.record(10), None);
        tokio::time::advance(Duration::from_secs(2)).await;
        let info = tracker.record(30).unwrap();
        assert_eq!(info.transferred, 40);
        assert_eq!(info.delta, 40);
        assert!((info.percent - 40.0).abs() < f64::EPSILON);
        assert_eq!(info.bytes_per_second, 20);

        // Rescheduled one interval ahead, and the delta restarted.
        assert_eq!(tracker.record(5), None);
        tokio::time::advance(PROGRESS_INTERVAL).await;
        assert_eq!(tracker.record(5).unwrap().delta, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowing_declared_total_suppresses_events() {
        let mut tracker = ProgressTracker::new(10);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(tracker.record(11), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_event_reports_completion() {
        let (events, callback) = collector();
        let body = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"defg")),
        ]);
        let forwarded: Vec<Bytes> = ProgressStream::new(body, 7, callback)
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(forwarded.concat(), b"abcdefg");

        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.transferred, 7);
        assert_eq!(last.total, 7);
        assert!((last.percent - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_final_event_without_declared_length() {
        let (events, callback) = collector();
        let body = futures_util::stream::iter(vec![Ok(Bytes::from_static(b"chunked body"))]);
        let _: Vec<_> = ProgressStream::new(body, 0, callback).collect().await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].total, 12);
        assert_eq!(events[0].transferred, 12);
    }
}
