//! Bounded, ordered message history

use std::collections::VecDeque;

use crate::session::message::{Message, MessageId};

/// Default number of messages retained per session
pub const DEFAULT_HISTORY_CAP: usize = 200;

/// Ordered message store that evicts its oldest entries beyond a fixed cap.
///
/// Insertion order is conversational order. Eviction is per message, so a
/// pair may be split at the front of the history.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    messages: VecDeque<Message>,
    cap: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl MessageHistory {
    /// Create an empty history holding at most `cap` messages (minimum 2).
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(2);
        Self {
            messages: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a user message and its assistant placeholder, then trim.
    ///
    /// Returns the number of evicted messages.
    pub(crate) fn push_pair(&mut self, user: Message, assistant: Message) -> usize {
        self.messages.push_back(user);
        self.messages.push_back(assistant);

        let mut evicted = 0;
        while self.messages.len() > self.cap {
            self.messages.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Look up a message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // The message being streamed is almost always the last one.
        self.messages.iter().rev().find(|m| m.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.id() == id)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + ExactSizeIterator {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pair_keeps_order() {
        let mut history = MessageHistory::default();
        let user = Message::user("q");
        let assistant = Message::assistant_placeholder();
        let (uid, aid) = (user.id(), assistant.id());

        assert_eq!(history.push_pair(user, assistant), 0);
        let ids: Vec<_> = history.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec![uid, aid]);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = MessageHistory::new(4);
        for i in 0..3 {
            history.push_pair(
                Message::user(format!("q{}", i)),
                Message::assistant_placeholder(),
            );
        }
        assert_eq!(history.len(), 4);
        let users: Vec<_> = history
            .iter()
            .filter(|m| !m.content().is_empty())
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(users, vec!["q1", "q2"]);
    }

    #[test]
    fn test_get_mut_finds_by_id() {
        let mut history = MessageHistory::default();
        let assistant = Message::assistant_placeholder();
        let id = assistant.id();
        history.push_pair(Message::user("q"), assistant);

        assert!(history.get_mut(id).unwrap().append("x"));
        assert_eq!(history.get(id).unwrap().content(), "x");
    }

    #[test]
    fn test_cap_has_floor_of_one_pair() {
        assert_eq!(MessageHistory::new(0).cap(), 2);
    }
}
