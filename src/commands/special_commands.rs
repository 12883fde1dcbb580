//! Special commands for the interactive chat session
//!
//! Lines starting with `/` (plus the bare words `exit` and `quit`) control
//! the session instead of being sent to the assistant.

use crate::models::{Aura, AuraIntensity, Feedback, LearningLevel};
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command is not recognized
    #[error("Unknown command: {0}\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// The command was given an argument it does not accept
    #[error("Unsupported argument for {command}: {arg}\nType '/help' for usage")]
    UnsupportedArgument {
        /// Command name
        command: String,
        /// The rejected argument
        arg: String,
    },

    /// The command needs an argument
    #[error("Missing argument for {command}\nUsage: {usage}")]
    MissingArgument {
        /// Command name
        command: String,
        /// Usage line
        usage: String,
    },
}

/// Special commands that can be entered during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a fresh conversation
    NewChat,

    /// List conversations
    ListConversations,

    /// Switch to another conversation (id or unique prefix)
    Switch(String),

    /// Change the learning level
    SetLevel(LearningLevel),

    /// Change the aura
    SetAura(Aura),

    /// Change the aura intensity
    SetIntensity(AuraIntensity),

    /// Pin or unpin the active conversation
    TogglePin,

    /// Rename the active conversation
    Rename(String),

    /// Delete the active conversation
    Delete,

    /// Like or dislike a message
    Feedback {
        /// Message id
        message_id: String,
        /// Feedback to toggle
        feedback: Feedback,
    },

    /// Show suggested prompts
    QuickPrompts,

    /// Speak the last reply to a WAV file
    Speak,

    /// Accept the pending aura suggestion
    AcceptSuggestion,

    /// Dismiss the pending aura suggestion
    DismissSuggestion,

    /// Show account, aura and usage
    Status,

    /// Show help
    Help,

    /// Leave the session
    Exit,

    /// Not a command; send the input as a message
    None,
}

fn required<'a>(command: &str, arg: &'a str, usage: &str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg)
    }
}

fn no_argument(command: &str, arg: &str, cmd: SpecialCommand) -> Result<SpecialCommand, CommandError> {
    if arg.is_empty() {
        Ok(cmd)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        })
    }
}

/// Parse user input for special commands
///
/// Command names are case-insensitive; arguments keep their case.
///
/// # Arguments
///
/// * `input` - The user input line
///
/// # Returns
///
/// The parsed command, or `SpecialCommand::None` for ordinary messages
///
/// # Errors
///
/// Returns `CommandError` for unknown commands and bad or missing arguments
///
/// # Examples
///
/// ```
/// use westline::commands::special_commands::{parse_special_command, SpecialCommand};
/// use westline::models::Aura;
///
/// assert_eq!(
///     parse_special_command("/aura ice drip").unwrap(),
///     SpecialCommand::SetAura(Aura::IceDrip)
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match name.as_str() {
        "/new" => no_argument("/new", arg, SpecialCommand::NewChat),
        "/list" | "/history" => no_argument(&name, arg, SpecialCommand::ListConversations),
        "/switch" => {
            required("/switch", arg, "/switch <conversation_id>")?;
            Ok(SpecialCommand::Switch(arg.to_string()))
        }
        "/level" => {
            let arg = required("/level", arg, "/level <learning level>")?;
            LearningLevel::parse_str(arg)
                .map(SpecialCommand::SetLevel)
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/level".to_string(),
                    arg: arg.to_string(),
                })
        }
        "/aura" => {
            let arg = required("/aura", arg, "/aura <off|rain|ice drip|lava|steam|fire>")?;
            Aura::parse_str(arg)
                .map(SpecialCommand::SetAura)
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/aura".to_string(),
                    arg: arg.to_string(),
                })
        }
        "/intensity" => {
            let arg = required("/intensity", arg, "/intensity <low|medium|high>")?;
            AuraIntensity::parse_str(arg)
                .map(SpecialCommand::SetIntensity)
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/intensity".to_string(),
                    arg: arg.to_string(),
                })
        }
        "/pin" => no_argument("/pin", arg, SpecialCommand::TogglePin),
        "/rename" => {
            required("/rename", arg, "/rename <title>")?;
            Ok(SpecialCommand::Rename(arg.to_string()))
        }
        "/delete" => no_argument("/delete", arg, SpecialCommand::Delete),
        "/like" | "/dislike" => {
            let usage = format!("{} <message_id>", name);
            let message_id = required(&name, arg, &usage)?;
            let feedback = if name == "/like" {
                Feedback::Like
            } else {
                Feedback::Dislike
            };
            Ok(SpecialCommand::Feedback {
                message_id: message_id.to_string(),
                feedback,
            })
        }
        "/prompts" => no_argument("/prompts", arg, SpecialCommand::QuickPrompts),
        "/speak" => no_argument("/speak", arg, SpecialCommand::Speak),
        "/accept" => no_argument("/accept", arg, SpecialCommand::AcceptSuggestion),
        "/dismiss" => no_argument("/dismiss", arg, SpecialCommand::DismissSuggestion),
        "/status" => no_argument("/status", arg, SpecialCommand::Status),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Display help information for interactive chat
pub fn print_help() {
    let help_text = r#"
WestlineGPT Chat - Special Commands
===================================

CONVERSATIONS:
  /new                - Start a new conversation
  /list               - List conversations (pinned first)
  /switch <id>        - Switch to a conversation (id or unique prefix)
  /pin                - Pin or unpin the current conversation
  /rename <title>     - Rename the current conversation
  /delete             - Delete the current conversation

PERSONA:
  /level <level>      - Absolute Beginner, Beginner Builder, Creator,
                        Pro Practitioner or Mentor & Launch
  /aura <aura>        - Off, Rain, Ice Drip, Lava, Steam or Fire
  /intensity <value>  - low, medium or high
  /accept             - Accept the suggested aura
  /dismiss            - Dismiss the suggested aura

MESSAGES:
  /like <id>          - Like a reply (again to clear)
  /dislike <id>       - Dislike a reply (again to clear)
  /prompts            - Show suggested prompts
  /speak              - Save the last reply as speech (westline-speech.wav)

SESSION:
  /status             - Show account, aura and image usage
  /help               - Show this help message
  exit, quit          - Leave the chat
"#;
    println!("{}", help_text);
}
