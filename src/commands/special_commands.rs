//! Special commands parser for interactive chat
//!
//! Lines starting with `/` are commands rather than questions. Commands are
//! case-insensitive; `exit` and `quit` also work without the slash.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Print the conversation so far, optionally only the last `n` messages
    History(Option<usize>),

    /// Display help information
    Help,

    /// Exit the session
    Exit,

    /// Not a special command; send the input as a question
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns CommandError::UnknownCommand if input starts with "/" but is not a valid command.
/// Returns CommandError::UnsupportedArgument if `/history` gets a non-numeric count.
///
/// # Examples
///
/// ```
/// use raidscope::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/help").unwrap(), SpecialCommand::Help);
/// assert_eq!(
///     parse_special_command("/history 4").unwrap(),
///     SpecialCommand::History(Some(4))
/// );
/// assert_eq!(
///     parse_special_command("Who died first?").unwrap(),
///     SpecialCommand::None
/// );
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    match lower.as_str() {
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/history" => Ok(SpecialCommand::History(None)),
        input if input.starts_with("/history ") => {
            let arg = input["/history ".len()..].trim();
            arg.parse::<usize>()
                .map(|n| SpecialCommand::History(Some(n)))
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/history".to_string(),
                    arg: arg.to_string(),
                })
        }

        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        input => {
            let cmd = input.split_whitespace().next().unwrap_or(input);
            Err(CommandError::UnknownCommand(cmd.to_string()))
        }
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

  /history        - Show the conversation so far
  /history <n>    - Show only the last n messages
  /help, /?       - Show this help
  /exit, exit     - Leave the chat (also: /quit, quit, CTRL-D)

While an answer is streaming, press CTRL-C to stop it. The text received
so far is kept.

Anything else is sent to the raid analyst as a question.
"#
    );
}
