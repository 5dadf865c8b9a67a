//! Raidscope - streaming chat client for a raid combat-log analysis agent
//!
//! This library provides the conversational layer in front of the analysis
//! service: a pull-based token stream over server-sent events, a chat session
//! that turns those events into message history, and one-shot deep-link
//! intake.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `transport`: `StreamTransport` trait, `TokenStream`, HTTP/SSE implementation
//! - `session`: `ChatSession`, messages and bounded history
//! - `intent`: deep-link question slot consumed exactly once
//! - `api`: non-streaming analyze client
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use raidscope::{ChatSession, Config, HttpStreamTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let transport = Arc::new(HttpStreamTransport::from_config(&config.api)?);
//!     let mut session = ChatSession::new(transport, &config.chat);
//!     session.send_message("Which boss phase had the most deaths?");
//!     session.finish().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod intent;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{RaidscopeError, Result};
pub use intent::IntentSlot;
pub use session::{ChatSession, Message, MessageStatus, Role, SendOutcome, SessionUpdate};
pub use transport::http::HttpStreamTransport;
pub use transport::{StreamEvent, StreamTransport, TokenStream};
