/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `chat` - Interactive streaming chat with the raid analyst
- `ask`  - One-shot question through the non-streaming endpoint
*/

use crate::config::Config;
use crate::error::Result;

// Special commands parser for the interactive loop
pub mod special_commands;

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Builds the HTTP stream transport and a `ChatSession`, sends any
    //! deep-linked question once, then runs a readline loop that streams each
    //! answer to stdout as it arrives.

    use super::*;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::intent::{self, IntentSlot};
    use crate::session::{ChatSession, Message, MessageStatus, Role, SendOutcome, SessionUpdate};
    use crate::transport::http::HttpStreamTransport;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::io::Write;
    use std::sync::Arc;
    use url::Url;

    /// How one streamed answer ended, as seen by the terminal loop
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AnswerEnd {
        /// The answer completed
        Completed,
        /// The stream failed with this diagnostic
        Failed(String),
        /// The user pressed CTRL-C
        Stopped,
        /// Nothing was streaming
        Idle,
    }

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `ask` - Question to send as soon as the chat opens
    /// * `link` - Chat-view URL whose deep-link parameter carries a question
    ///
    /// # Errors
    ///
    /// Returns an error if `link` is not a valid URL, the transport cannot be
    /// built, or the terminal cannot be initialised.
    pub async fn run_chat(config: Config, ask: Option<String>, link: Option<String>) -> Result<()> {
        tracing::info!("Starting interactive chat");

        let slot = intent_slot(&config, ask, link)?;
        let transport = Arc::new(HttpStreamTransport::from_config(&config.api)?);
        tracing::debug!(endpoint = %transport.endpoint(), "Using streaming endpoint");

        let mut session = ChatSession::new(transport, &config.chat);
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&config);

        if let Some(outcome) = intent::activate(&slot, &mut session) {
            if let Some(question) = accepted_question(&session, outcome) {
                println!("{} {}", "you>".cyan().bold(), question);
                stream_answer(&mut session).await;
            }
        }

        loop {
            match rl.readline(&format!("{} ", "you>".cyan().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::History(limit)) => {
                            print_history(&session, limit);
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {}
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    match session.send_message(trimmed) {
                        SendOutcome::Accepted { .. } => {
                            stream_answer(&mut session).await;
                        }
                        SendOutcome::Rejected(reason) => {
                            eprintln!("{}", format!("Not sent: {}", reason).yellow());
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        session.close();
        println!("Goodbye!");
        Ok(())
    }

    /// Build the deep-link slot from `--link` or `--ask`
    pub fn intent_slot(
        config: &Config,
        ask: Option<String>,
        link: Option<String>,
    ) -> Result<IntentSlot> {
        match link {
            Some(link) => {
                let mut url = Url::parse(&link)?;
                let slot = IntentSlot::from_url(&mut url, &config.chat.deep_link_param);
                tracing::debug!(url = %url, pending = slot.is_pending(), "Parsed chat link");
                Ok(slot)
            }
            None => Ok(IntentSlot::new(ask)),
        }
    }

    fn accepted_question(session: &ChatSession, outcome: SendOutcome) -> Option<String> {
        match outcome {
            SendOutcome::Accepted { user_id, .. } => session
                .history()
                .get(user_id)
                .map(|m| m.content().to_string()),
            SendOutcome::Rejected(reason) => {
                tracing::warn!("Deep-linked question not sent: {}", reason);
                None
            }
        }
    }

    enum Step {
        Update(Option<SessionUpdate>),
        Interrupted,
    }

    /// Print the active answer as it streams
    ///
    /// CTRL-C stops the answer and keeps the text received so far.
    pub async fn stream_answer(session: &mut ChatSession) -> AnswerEnd {
        stream_answer_until(session, tokio::signal::ctrl_c()).await
    }

    /// Print the active answer until it ends or `interrupt` resolves
    ///
    /// `interrupt` is polled across the whole answer, so a signal that
    /// arrives while a token is being printed is still honoured.
    pub async fn stream_answer_until<F>(session: &mut ChatSession, interrupt: F) -> AnswerEnd
    where
        F: std::future::Future<Output = std::io::Result<()>>,
    {
        let mut printed = false;
        let mut signals = true;
        let mut stdout = std::io::stdout();

        tokio::pin!(interrupt);

        println!();
        let end = loop {
            let step = tokio::select! {
                update = session.next_update() => Step::Update(update),
                res = &mut interrupt, if signals => match res {
                    Ok(()) => Step::Interrupted,
                    Err(e) => {
                        tracing::warn!("CTRL-C handling unavailable: {}", e);
                        signals = false;
                        continue;
                    }
                },
            };

            match step {
                Step::Interrupted => {
                    session.cancel();
                    println!("\n{}", "[answer stopped]".yellow());
                    break AnswerEnd::Stopped;
                }
                Step::Update(None) => {
                    break if printed {
                        AnswerEnd::Stopped
                    } else {
                        AnswerEnd::Idle
                    };
                }
                Step::Update(Some(SessionUpdate::QueryType { tag, .. })) => {
                    tracing::debug!(query_type = %tag, "Answer classified");
                    println!("{}", format!("[{}]", tag).dimmed());
                }
                Step::Update(Some(SessionUpdate::Token { delta, .. })) => {
                    print!("{}", delta);
                    let _ = stdout.flush();
                    printed = true;
                }
                Step::Update(Some(SessionUpdate::Completed { .. })) => {
                    println!();
                    break AnswerEnd::Completed;
                }
                Step::Update(Some(SessionUpdate::Failed { id, message })) => {
                    if printed {
                        println!();
                        eprintln!("{}", format!("(answer interrupted: {})", message).red());
                    } else if let Some(entry) = session.history().get(id) {
                        println!("{}", entry.content().red());
                    }
                    break AnswerEnd::Failed(message);
                }
            }
        };

        println!();
        end
    }

    fn print_history(session: &ChatSession, limit: Option<usize>) {
        let history = session.history();
        if history.is_empty() {
            println!("No messages yet.\n");
            return;
        }

        let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
        println!();
        for message in history.iter().skip(skip) {
            println!("{}\n", format_history_entry(message));
        }
    }

    /// Render one message for `/history`
    pub fn format_history_entry(message: &Message) -> String {
        let stamp = message.timestamp().format("%H:%M:%S").to_string();
        let label = match message.role() {
            Role::User => "you".cyan().bold().to_string(),
            Role::Assistant => "analyst".green().bold().to_string(),
        };

        let mut header = format!("[{}] {}", stamp.dimmed(), label);
        if let Some(tag) = message.query_type() {
            header.push_str(&format!(" {}", format!("({})", tag).dimmed()));
        }
        match message.status() {
            MessageStatus::Streaming => header.push_str(&format!(" {}", "streaming".yellow())),
            MessageStatus::Cancelled => header.push_str(&format!(" {}", "stopped".yellow())),
            MessageStatus::Failed => header.push_str(&format!(" {}", "failed".red())),
            MessageStatus::Complete => {}
        }

        format!("{}\n{}", header, message.content())
    }

    /// Display welcome banner at the start of interactive chat
    fn print_welcome_banner(config: &Config) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║            Raidscope Raid Analyst - Interactive Chat         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Service: {}", config.api.base_url.cyan());
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

}

// One-shot ask command handler
pub mod ask {
    //! Non-streaming question handler.

    use super::*;
    use crate::api::AnalyzeClient;
    use colored::Colorize;

    /// Ask a single question and print the answer
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `question` - The question to ask
    /// * `json` - Print the raw response as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the question is empty or the request fails.
    pub async fn run_ask(config: Config, question: String, json: bool) -> Result<()> {
        let question = question.trim();
        if question.is_empty() {
            return Err(crate::error::RaidscopeError::Config(
                "Question cannot be empty".to_string(),
            )
            .into());
        }

        let client = AnalyzeClient::from_config(&config.api)?;
        let response = client.analyze(question).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            if let Some(tag) = &response.query_type {
                println!("{}", format!("[{}]", tag).dimmed());
            }
            println!("{}", response.answer);
        }

        Ok(())
    }

}
