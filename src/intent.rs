//! One-shot deep-link question intake
//!
//! A chat view may be opened with a question in its URL
//! (`/chat?q=Who+died+first`). [`IntentSlot`] holds that question until the
//! view activates, then hands it to the session exactly once: the value is
//! taken out of the slot before it is sent, so any later activation finds
//! the slot empty.

use std::sync::Mutex;

use url::Url;

use crate::session::{ChatSession, SendOutcome};

/// Pending question carried by an external navigation parameter
#[derive(Debug, Default)]
pub struct IntentSlot {
    pending: Mutex<Option<String>>,
}

impl IntentSlot {
    /// Create a slot; blank questions leave it empty.
    pub fn new(question: Option<String>) -> Self {
        let pending = question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        Self {
            pending: Mutex::new(pending),
        }
    }

    /// Consume the `param` query parameter from `url`
    ///
    /// The first value becomes the pending question and every occurrence of
    /// the parameter is removed from `url`, leaving the cleared navigation
    /// state behind.
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use raidscope::intent::IntentSlot;
    ///
    /// let mut url = Url::parse("https://raids.example.com/chat?q=Who+died%3F&tab=2").unwrap();
    /// let slot = IntentSlot::from_url(&mut url, "q");
    ///
    /// assert_eq!(url.as_str(), "https://raids.example.com/chat?tab=2");
    /// assert_eq!(slot.take().as_deref(), Some("Who died?"));
    /// assert_eq!(slot.take(), None);
    /// ```
    pub fn from_url(url: &mut Url, param: &str) -> Self {
        let mut question = None;
        let mut kept: Vec<(String, String)> = Vec::new();

        for (key, value) in url.query_pairs() {
            if key == param {
                if question.is_none() {
                    question = Some(value.into_owned());
                }
            } else {
                kept.push((key.into_owned(), value.into_owned()));
            }
        }

        if question.is_some() {
            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept);
            }
            tracing::debug!(param, "Consumed deep-link parameter");
        }

        Self::new(question)
    }

    /// Take the pending question, leaving the slot empty
    pub fn take(&self) -> Option<String> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Whether a question is still waiting
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

/// Send the slot's pending question, if any
///
/// Returns `None` when the slot was already consumed.
pub fn activate(slot: &IntentSlot, session: &mut ChatSession) -> Option<SendOutcome> {
    let question = slot.take()?;
    tracing::info!("Sending deep-linked question");
    Some(session.send_message(&question))
}
