//! Chat session: message history plus the single in-flight answer
//!
//! [`ChatSession`] turns each question into a user/assistant message pair,
//! opens one [`TokenStream`] for it and applies the stream's events to the
//! assistant message as the owner pulls them with
//! [`ChatSession::next_update`].
//!
//! # Lifecycle
//!
//! ```text
//! idle --send_message--> streaming --Complete/Error/cancel--> idle
//! ```
//!
//! A send while streaming is rejected. Failures never escape the session:
//! they become the assistant message's text (or are dropped in favour of
//! partial text already received).
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use raidscope::config::Config;
//! use raidscope::session::{ChatSession, SessionUpdate};
//! use raidscope::transport::http::HttpStreamTransport;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let transport = Arc::new(HttpStreamTransport::from_config(&config.api)?);
//! let mut session = ChatSession::new(transport, &config.chat);
//!
//! session.send_message("Who took the most avoidable damage?");
//! while let Some(update) = session.next_update().await {
//!     if let SessionUpdate::Token { delta, .. } = update {
//!         print!("{}", delta);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::StreamExt;

use crate::config::{ChatConfig, ERROR_MESSAGE_PLACEHOLDER};
use crate::transport::{CancelHandle, StreamEvent, StreamTransport, TokenStream};

pub mod history;
pub mod message;

pub use history::{MessageHistory, DEFAULT_HISTORY_CAP};
pub use message::{Message, MessageId, MessageStatus, Role};

/// Result of [`ChatSession::send_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The pair was appended and a stream opened
    Accepted {
        user_id: MessageId,
        assistant_id: MessageId,
    },
    /// Nothing happened
    Rejected(RejectReason),
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted { .. })
    }
}

/// Why a send was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The question was empty after trimming
    EmptyQuestion,
    /// An answer is still streaming
    AlreadyStreaming,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyQuestion => write!(f, "question is empty"),
            RejectReason::AlreadyStreaming => write!(f, "an answer is still streaming"),
        }
    }
}

/// One applied change to the history, for incremental rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Text was appended to the assistant message
    Token { id: MessageId, delta: String },
    /// The assistant message was tagged with a query type
    QueryType { id: MessageId, tag: String },
    /// The answer finished normally
    Completed { id: MessageId },
    /// The answer failed; `message` is the transport diagnostic
    Failed { id: MessageId, message: String },
}

impl SessionUpdate {
    /// Whether the update ends the current answer
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionUpdate::Completed { .. } | SessionUpdate::Failed { .. }
        )
    }
}

#[derive(Debug)]
struct ActiveStream {
    assistant_id: MessageId,
    stream: TokenStream,
}

/// Conversation state owned by one chat view
#[derive(Debug)]
pub struct ChatSession {
    transport: Arc<dyn StreamTransport>,
    history: MessageHistory,
    active: Option<ActiveStream>,
    error_template: String,
}

impl ChatSession {
    /// Create an idle session with an empty history
    ///
    /// # Arguments
    ///
    /// * `transport` - Opens one stream per accepted question
    /// * `config` - History cap and error template
    pub fn new(transport: Arc<dyn StreamTransport>, config: &ChatConfig) -> Self {
        Self {
            transport,
            history: MessageHistory::new(config.history_cap),
            active: None,
            error_template: config.error_template.clone(),
        }
    }

    /// Ask a question
    ///
    /// Appends the user message and an empty assistant placeholder, then
    /// opens a stream for the trimmed question. Rejected without any effect
    /// when the question is blank or an answer is still streaming.
    pub fn send_message(&mut self, question: &str) -> SendOutcome {
        let question = question.trim();
        if question.is_empty() {
            tracing::debug!("Ignoring empty question");
            return SendOutcome::Rejected(RejectReason::EmptyQuestion);
        }
        if self.active.is_some() {
            tracing::warn!("Rejecting question while an answer is streaming");
            return SendOutcome::Rejected(RejectReason::AlreadyStreaming);
        }

        let user = Message::user(question);
        let assistant = Message::assistant_placeholder();
        let user_id = user.id();
        let assistant_id = assistant.id();

        let evicted = self.history.push_pair(user, assistant);
        if evicted > 0 {
            tracing::debug!(evicted, "Trimmed history to cap {}", self.history.cap());
        }

        let stream = self.transport.open(question);
        self.active = Some(ActiveStream {
            assistant_id,
            stream,
        });

        tracing::info!(%assistant_id, "Question sent");

        SendOutcome::Accepted {
            user_id,
            assistant_id,
        }
    }

    /// Whether an answer is in flight
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the assistant message currently streaming, if any
    pub fn active_message(&self) -> Option<MessageId> {
        self.active.as_ref().map(|a| a.assistant_id)
    }

    /// Handle that stops the in-flight answer from another task
    ///
    /// The session notices on its next [`ChatSession::next_update`] and
    /// freezes the message as cancelled.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.active.as_ref().map(|a| a.stream.cancel_handle())
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Pull and apply the next event of the active stream
    ///
    /// Returns `None` when idle. Cancel-safe: dropping the future before it
    /// resolves loses no event and changes nothing.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let event = {
            let active = self.active.as_mut()?;
            active.stream.next().await
        };
        let active = self.active.as_ref()?;
        let id = active.assistant_id;

        let Some(event) = event else {
            // Stopped through a cancel handle.
            self.active = None;
            if let Some(message) = self.history.get_mut(id) {
                message.cancel();
            }
            tracing::info!(%id, "Answer cancelled");
            return None;
        };

        let update = match event {
            StreamEvent::Token(delta) => {
                if let Some(message) = self.history.get_mut(id) {
                    message.append(&delta);
                }
                SessionUpdate::Token { id, delta }
            }
            StreamEvent::QueryType(tag) => {
                if let Some(message) = self.history.get_mut(id) {
                    message.set_query_type(&tag);
                }
                SessionUpdate::QueryType { id, tag }
            }
            StreamEvent::Complete => {
                self.active = None;
                if let Some(message) = self.history.get_mut(id) {
                    message.complete();
                }
                tracing::info!(%id, "Answer complete");
                SessionUpdate::Completed { id }
            }
            StreamEvent::Error(message) => {
                self.active = None;
                let template = &self.error_template;
                if let Some(entry) = self.history.get_mut(id) {
                    entry.fail(|| render_error(template, &message));
                }
                tracing::warn!(%id, "Answer failed: {}", message);
                SessionUpdate::Failed { id, message }
            }
        };

        Some(update)
    }

    /// Drive the active answer to its end, returning its final update
    pub async fn finish(&mut self) -> Option<SessionUpdate> {
        let mut last = None;
        while let Some(update) = self.next_update().await {
            last = Some(update);
        }
        last.filter(SessionUpdate::is_terminal)
    }

    /// Stop the in-flight answer, keeping whatever text already arrived
    ///
    /// Returns `false` when nothing was streaming.
    pub fn cancel(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        active.stream.cancel();
        if let Some(message) = self.history.get_mut(active.assistant_id) {
            message.cancel();
        }
        tracing::info!(id = %active.assistant_id, "Answer cancelled");
        true
    }

    /// Tear the session down, stopping any active stream
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stream.cancel();
            tracing::debug!(id = %active.assistant_id, "Released active stream on teardown");
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn render_error(template: &str, message: &str) -> String {
    template.replace(ERROR_MESSAGE_PLACEHOLDER, message)
}
