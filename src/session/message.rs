//! Chat messages and their lifecycle
//!
//! A [`Message`] is created by the session and handed out read-only. Its
//! mutators are crate-private and only act while the message is
//! [`MessageStatus::Streaming`], so an assistant answer is append-only until
//! its stream terminates and frozen afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a message, unique for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions
    User,
    /// The analysis agent
    Assistant,
}

/// Lifecycle state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Answer text is still arriving
    Streaming,
    /// Finished normally (user messages are always complete)
    Complete,
    /// The stream failed
    Failed,
    /// The user stopped the answer
    Cancelled,
}

/// One entry of the conversation
///
/// # Examples
///
/// ```
/// use raidscope::session::{Message, MessageStatus, Role};
///
/// let msg = Message::user("Who stood in fire?");
/// assert_eq!(msg.role(), Role::User);
/// assert_eq!(msg.content(), "Who stood in fire?");
/// assert_eq!(msg.status(), MessageStatus::Complete);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_type: Option<String>,
    timestamp: DateTime<Utc>,
    status: MessageStatus,
}

impl Message {
    /// Create a finished user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            query_type: None,
            timestamp: Utc::now(),
            status: MessageStatus::Complete,
        }
    }

    /// Create an empty assistant placeholder awaiting its stream
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: String::new(),
            query_type: None,
            timestamp: Utc::now(),
            status: MessageStatus::Streaming,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Classification tag reported by the agent, if any
    pub fn query_type(&self) -> Option<&str> {
        self.query_type.as_deref()
    }

    /// When the message was created
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    /// Whether the content may still change
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    pub(crate) fn append(&mut self, delta: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.content.push_str(delta);
        true
    }

    pub(crate) fn set_query_type(&mut self, tag: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.query_type = Some(tag.to_string());
        true
    }

    pub(crate) fn complete(&mut self) -> bool {
        self.finish(MessageStatus::Complete)
    }

    /// Mark as failed; `error_text` replaces the content only when nothing
    /// was streamed yet.
    pub(crate) fn fail(&mut self, error_text: impl FnOnce() -> String) -> bool {
        if !self.is_streaming() {
            return false;
        }
        if self.content.is_empty() {
            self.content = error_text();
        }
        self.status = MessageStatus::Failed;
        true
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.finish(MessageStatus::Cancelled)
    }

    fn finish(&mut self, status: MessageStatus) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_user_message_is_immutable() {
        let mut msg = Message::user("question");
        assert!(!msg.append(" more"));
        assert!(!msg.set_query_type("tag"));
        assert_eq!(msg.content(), "question");
    }

    #[test]
    fn test_assistant_appends_until_complete() {
        let mut msg = Message::assistant_placeholder();
        assert_eq!(msg.content(), "");
        assert!(msg.append("A"));
        assert!(msg.append("B"));
        assert!(msg.complete());
        assert!(!msg.append("C"));
        assert_eq!(msg.content(), "AB");
        assert_eq!(msg.status(), MessageStatus::Complete);
    }

    #[test]
    fn test_fail_on_empty_content_uses_error_text() {
        let mut msg = Message::assistant_placeholder();
        assert!(msg.fail(|| "Error: boom".to_string()));
        assert_eq!(msg.content(), "Error: boom");
        assert_eq!(msg.status(), MessageStatus::Failed);
    }

    #[test]
    fn test_fail_keeps_partial_content() {
        let mut msg = Message::assistant_placeholder();
        msg.append("partial");
        msg.fail(|| "Error: boom".to_string());
        assert_eq!(msg.content(), "partial");
    }

    #[test]
    fn test_cancel_freezes_message() {
        let mut msg = Message::assistant_placeholder();
        msg.append("half");
        assert!(msg.cancel());
        assert!(!msg.cancel());
        assert!(!msg.fail(|| "late".to_string()));
        assert_eq!(msg.content(), "half");
        assert_eq!(msg.status(), MessageStatus::Cancelled);
    }

    #[test]
    fn test_serializes_role_lowercase() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "complete");
        assert!(json.get("query_type").is_none());
    }
}
