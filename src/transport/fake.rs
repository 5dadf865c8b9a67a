//! Scripted in-process transport for session tests
//!
//! [`ScriptedTransport`] replaces the HTTP transport in unit tests. Each call
//! to `open` consumes the next queued [`Script`]:
//!
//! - [`Script::Events`] replays a fixed list of events immediately.
//! - [`Script::Controlled`] forwards whatever the test pushes through the
//!   matching [`ScriptHandle`], so tests can observe the session mid-stream.
//!
//! When the queue is empty the opened stream stays pending forever.
//!
//! ```text
//! test handle.token("A") --> script rx --> EventSink --> TokenStream (session)
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::transport::{StreamEvent, StreamTransport, TokenStream};

/// What one opened stream will do.
#[derive(Debug)]
pub enum Script {
    /// Emit these events in order, then stop
    Events(Vec<StreamEvent>),
    /// Forward events pushed through a [`ScriptHandle`]
    Controlled(mpsc::UnboundedReceiver<StreamEvent>),
}

/// Test-side driver for a [`Script::Controlled`] stream.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ScriptHandle {
    /// Push a text fragment; `false` once the stream stopped listening.
    pub fn token(&self, delta: &str) -> bool {
        self.tx.send(StreamEvent::Token(delta.to_string())).is_ok()
    }

    /// Push a classification tag.
    pub fn query_type(&self, tag: &str) -> bool {
        self.tx.send(StreamEvent::QueryType(tag.to_string())).is_ok()
    }

    /// Finish the stream successfully.
    pub fn complete(&self) -> bool {
        self.tx.send(StreamEvent::Complete).is_ok()
    }

    /// Finish the stream with a failure.
    pub fn error(&self, message: &str) -> bool {
        self.tx.send(StreamEvent::Error(message.to_string())).is_ok()
    }

    /// Whether the consuming stream has been cancelled or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Fake [`StreamTransport`] driven by queued scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream that replays `events`.
    pub fn push_events(&self, events: Vec<StreamEvent>) {
        self.lock_scripts().push_back(Script::Events(events));
    }

    /// Queue a stream answering `tokens` and completing.
    pub fn push_answer(&self, tokens: &[&str]) {
        let mut events: Vec<StreamEvent> = tokens
            .iter()
            .map(|t| StreamEvent::Token((*t).to_string()))
            .collect();
        events.push(StreamEvent::Complete);
        self.push_events(events);
    }

    /// Queue a stream controlled through the returned handle.
    pub fn push_controlled(&self) -> ScriptHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_scripts().push_back(Script::Controlled(rx));
        ScriptHandle { tx }
    }

    /// Questions passed to `open`, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of streams opened so far.
    pub fn open_count(&self) -> usize {
        self.opened().len()
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, VecDeque<Script>> {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StreamTransport for ScriptedTransport {
    fn open(&self, question: &str) -> TokenStream {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(question.to_string());

        let script = self.lock_scripts().pop_front();

        TokenStream::spawn(move |sink| async move {
            match script {
                Some(Script::Events(events)) => {
                    for event in events {
                        if !sink.emit(event) {
                            return;
                        }
                    }
                }
                Some(Script::Controlled(mut rx)) => {
                    while let Some(event) = rx.recv().await {
                        let terminal = event.is_terminal();
                        if !sink.emit(event) || terminal {
                            return;
                        }
                    }
                }
                None => std::future::pending::<()>().await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_records_opened_questions() {
        let transport = ScriptedTransport::new();
        transport.push_answer(&["ok"]);

        let mut stream = transport.open("Who died most?");
        assert_eq!(stream.next().await, Some(StreamEvent::Token("ok".into())));
        assert_eq!(stream.next().await, Some(StreamEvent::Complete));
        assert_eq!(transport.opened(), vec!["Who died most?".to_string()]);
    }

    #[tokio::test]
    async fn test_controlled_stream_follows_handle() {
        let transport = ScriptedTransport::new();
        let handle = transport.push_controlled();
        let mut stream = transport.open("q");

        handle.token("A");
        assert_eq!(stream.next().await, Some(StreamEvent::Token("A".into())));
        handle.error("down");
        assert_eq!(stream.next().await, Some(StreamEvent::Error("down".into())));
        assert_eq!(stream.next().await, None);
    }
}
