//! Streaming transport abstraction for the analyze endpoint
//!
//! A [`StreamTransport`] turns one question into a [`TokenStream`]: an
//! ordered, pull-based sequence of [`StreamEvent`]s fed by a background
//! Tokio task. Implementations live in submodules:
//!
//! - [`http::HttpStreamTransport`] -- `POST`s the question and decodes the
//!   server-sent event response.
//! - `fake::ScriptedTransport` -- in-process fake used in tests (cfg(test)
//!   only).
//!
//! # Guarantees
//!
//! Every [`TokenStream`] yields zero or more [`StreamEvent::Token`] items
//! followed by exactly one terminal event ([`StreamEvent::Complete`] or
//! [`StreamEvent::Error`]), after which it yields `None` forever. A producer
//! that exits without a terminal event is reported as an error. After
//! [`TokenStream::cancel`] (or a [`CancelHandle`]) fires the stream yields
//! `None` without draining buffered events, and the background task is
//! stopped, releasing the connection.
//!
//! # Canonical Import Path
//!
//! ```no_run
//! use raidscope::transport::{StreamEvent, StreamTransport, TokenStream};
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod http;
pub mod metrics;

#[cfg(test)]
pub mod fake;

use self::metrics::{StreamMetrics, StreamOutcome};

/// One item delivered by a [`TokenStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text fragment to append to the answer
    Token(String),
    /// Classification tag the agent assigned to the question
    QueryType(String),
    /// The answer finished normally
    Complete,
    /// The stream broke; carries a human-readable diagnostic
    Error(String),
}

impl StreamEvent {
    /// Whether this event ends the stream
    ///
    /// # Examples
    ///
    /// ```
    /// use raidscope::transport::StreamEvent;
    ///
    /// assert!(StreamEvent::Complete.is_terminal());
    /// assert!(StreamEvent::Error("boom".into()).is_terminal());
    /// assert!(!StreamEvent::Token("A".into()).is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error(_))
    }
}

/// Opens token streams for questions.
///
/// `open` never blocks: it schedules the request on the current Tokio
/// runtime and returns immediately. It must therefore be called from within
/// a runtime context.
pub trait StreamTransport: Send + Sync + std::fmt::Debug {
    /// Start answering `question` (non-empty, already trimmed).
    fn open(&self, question: &str) -> TokenStream;
}

/// Producer half of a [`TokenStream`], handed to the background task.
///
/// Every emit reports whether the consumer is still listening; producers
/// stop as soon as it returns `false`.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
    cancellation: CancellationToken,
}

impl EventSink {
    /// Deliver an event to the consumer.
    pub fn emit(&self, event: StreamEvent) -> bool {
        if self.cancellation.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Deliver a text fragment.
    pub fn token(&self, delta: impl Into<String>) -> bool {
        self.emit(StreamEvent::Token(delta.into()))
    }

    /// Deliver the successful terminal event.
    pub fn complete(&self) -> bool {
        self.emit(StreamEvent::Complete)
    }

    /// Deliver the failed terminal event.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(StreamEvent::Error(message.into()))
    }

    /// Whether the consumer has gone away or cancelled.
    pub fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled() || self.tx.is_closed()
    }

    /// Sink wired to a bare receiver, for exercising producers directly.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                cancellation: CancellationToken::new(),
            },
            rx,
        )
    }
}

/// Cloneable handle that cancels one [`TokenStream`] from elsewhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancellation: CancellationToken,
}

impl CancelHandle {
    /// Stop the stream. Idempotent.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the stream has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Consumer half of one in-flight answer.
///
/// Implements [`Stream`] so it can be driven with `StreamExt::next`.
#[derive(Debug)]
pub struct TokenStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    cancellation: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
    metrics: StreamMetrics,
}

impl TokenStream {
    /// Spawn `producer` on the current runtime and return the stream it feeds.
    ///
    /// The producer runs until it returns, or until the stream is cancelled or
    /// dropped, whichever comes first.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancellation = CancellationToken::new();
        let sink = EventSink {
            tx,
            cancellation: cancellation.clone(),
        };
        let work = producer(sink);
        let guard = cancellation.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = guard.cancelled() => {
                    tracing::debug!("Stream producer stopped by cancellation");
                }
                _ = work => {}
            }
        });

        Self {
            rx,
            cancellation,
            task: Some(task),
            finished: false,
            metrics: StreamMetrics::start(),
        }
    }

    /// Handle that cancels this stream from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancellation: self.cancellation.clone(),
        }
    }

    /// Whether a terminal event was delivered or the stream was cancelled.
    pub fn is_finished(&self) -> bool {
        self.finished || self.cancellation.is_cancelled()
    }

    /// Stop the stream: no further event is yielded once this returns.
    ///
    /// Returns `false` (and does nothing) when the stream had already
    /// terminated.
    pub fn cancel(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.cancellation.cancel();
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.metrics.finish(StreamOutcome::Cancelled);
        true
    }

    fn terminate(&mut self, outcome: StreamOutcome) {
        self.finished = true;
        self.rx.close();
        // The producer is done with the connection once it sent a terminal
        // event; dropping the handle lets the task finish on its own.
        self.task.take();
        self.metrics.finish(outcome);
    }
}

impl Stream for TokenStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }
        if this.cancellation.is_cancelled() {
            // Cancelled through a `CancelHandle`.
            this.cancel();
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(event)) => {
                match &event {
                    StreamEvent::Token(_) => this.metrics.record_token(),
                    StreamEvent::Complete => this.terminate(StreamOutcome::Complete),
                    StreamEvent::Error(_) => this.terminate(StreamOutcome::Error),
                    StreamEvent::QueryType(_) => {}
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                if this.cancellation.is_cancelled() {
                    this.cancel();
                    return Poll::Ready(None);
                }
                this.terminate(StreamOutcome::Error);
                Poll::Ready(Some(StreamEvent::Error(
                    "stream closed without a completion signal".to_string(),
                )))
            }
        }
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    async fn collect(mut stream: TokenStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_tokens_then_complete_in_order() {
        let stream = TokenStream::spawn(|sink| async move {
            sink.token("A");
            sink.token("B");
            sink.token("C");
            sink.complete();
        });

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("A".into()),
                StreamEvent::Token("B".into()),
                StreamEvent::Token("C".into()),
                StreamEvent::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_after_terminal_event() {
        let stream = TokenStream::spawn(|sink| async move {
            sink.token("partial");
            sink.error("boom");
            sink.token("late");
            sink.complete();
        });

        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("partial".into()),
                StreamEvent::Error("boom".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_producer_exit_without_terminal_is_error() {
        let stream = TokenStream::spawn(|sink| async move {
            sink.token("half");
        });

        let events = collect(stream).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Error(msg) if msg.contains("completion")));
    }

    #[tokio::test]
    async fn test_cancel_stops_buffered_events() {
        let mut stream = TokenStream::spawn(|sink| async move {
            sink.token("A");
            sink.token("B");
            tokio::time::sleep(Duration::from_secs(60)).await;
            sink.complete();
        });

        assert_eq!(stream.next().await, Some(StreamEvent::Token("A".into())));
        assert!(stream.cancel());
        assert_eq!(stream.next().await, None);
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn test_cancel_after_terminal_is_noop() {
        let mut stream = TokenStream::spawn(|sink| async move {
            sink.complete();
        });

        assert_eq!(stream.next().await, Some(StreamEvent::Complete));
        assert!(!stream.cancel());
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_handle_from_other_task() {
        let mut stream = TokenStream::spawn(|sink| async move {
            sink.token("first");
            std::future::pending::<()>().await;
        });
        let handle = stream.cancel_handle();

        assert_eq!(stream.next().await, Some(StreamEvent::Token("first".into())));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("cancellation should wake the consumer");
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_cancel_reports_closed_sink_to_producer() {
        let (observed_tx, observed_rx) = tokio::sync::oneshot::channel();
        let mut stream = TokenStream::spawn(|sink| async move {
            let probe = sink.clone();
            let _ = observed_tx.send(probe);
            std::future::pending::<()>().await;
        });
        let probe = observed_rx.await.unwrap();

        assert!(!probe.is_closed());
        stream.cancel();
        assert!(probe.is_closed());
        assert!(!probe.token("ignored"));
    }

    #[tokio::test]
    async fn test_drop_cancels_producer() {
        let stream = TokenStream::spawn(|_sink| std::future::pending::<()>());
        let handle = stream.cancel_handle();
        drop(stream);
        assert!(handle.is_cancelled());
    }
}
