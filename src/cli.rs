//! Command-line interface definition for Westline
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, accounts, history, images and speech.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// WestlineGPT - your creative assistant in the terminal
///
/// Chat with WestlineGPT, generate and edit images, and listen to replies.
#[derive(Parser, Debug, Clone)]
#[command(name = "westline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the storage database path
    #[arg(long, env = "WESTLINE_DB")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Westline
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Learning level for this session (e.g. "Creator")
        #[arg(short, long)]
        level: Option<String>,

        /// Aura for this session (e.g. "Rain")
        #[arg(short, long)]
        aura: Option<String>,

        /// Resume a specific conversation
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Send a single message and print the reply
    Ask {
        /// Message to send
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Start a new conversation instead of continuing the most recent one
        #[arg(short, long)]
        new: bool,

        /// Continue this conversation (id or unique prefix)
        #[arg(short, long, conflicts_with = "new")]
        conversation: Option<String>,

        /// Aura persona to answer with
        #[arg(short, long)]
        aura: Option<String>,
    },

    /// Create an account
    Signup {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Password (at least 6 characters)
        #[arg(long)]
        password: String,

        /// Password confirmation (defaults to the password)
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Sign in with email and password
    Login {
        /// Email address
        #[arg(long)]
        email: String,

        /// Password
        #[arg(long)]
        password: String,
    },

    /// Sign in with a social provider
    SocialLogin {
        /// Display name shared by the provider
        #[arg(long)]
        name: String,

        /// Email shared by the provider
        #[arg(long)]
        email: String,
    },

    /// Request a password reset link
    ForgotPassword {
        /// Email address
        #[arg(long)]
        email: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account and usage
    Whoami,

    /// Manage conversation history
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Generate or edit images
    Image {
        /// Image subcommand
        #[command(subcommand)]
        command: ImageCommand,
    },

    /// Browse generated images
    Gallery {
        /// Gallery subcommand
        #[command(subcommand)]
        command: GalleryCommand,
    },

    /// Synthesize speech to a WAV file
    Speak {
        /// Text to speak; defaults to the last reply in the active conversation
        text: Vec<String>,

        /// Voice override (Puck, Charon, Kore, Fenrir, Zephyr)
        #[arg(long)]
        voice: Option<String>,

        /// Output WAV path
        #[arg(short, long, default_value = "westline-speech.wav")]
        out: PathBuf,
    },

    /// Show or change preferences
    Prefs {
        /// Preferences subcommand
        #[command(subcommand)]
        command: PrefsCommand,
    },

    /// Unlock premium with an access code
    Premium {
        /// Access code
        code: String,
    },

    /// Manage the stored API key
    Key {
        /// Key subcommand
        #[command(subcommand)]
        command: KeyCommand,
    },
}

/// Conversation history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List conversations (pinned first, then most recent)
    List,

    /// Print a conversation
    Show {
        /// Conversation id (or unique prefix)
        id: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id (or unique prefix)
        id: String,
    },

    /// Toggle the pinned flag
    Pin {
        /// Conversation id (or unique prefix)
        id: String,
    },

    /// Rename a conversation
    Rename {
        /// Conversation id (or unique prefix)
        id: String,

        /// New title
        title: Vec<String>,
    },

    /// Like or dislike a message (repeating the same feedback clears it)
    Feedback {
        /// Message id
        message: String,

        /// like or dislike
        feedback: String,
    },

    /// Delete every conversation
    Clear,
}

/// Image subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ImageCommand {
    /// Generate an image from a prompt
    Generate {
        /// Prompt; a random creative prompt is used when omitted
        prompt: Vec<String>,

        /// Aspect ratio (1:1, 16:9, 9:16, 4:3, 3:4)
        #[arg(long, default_value = "1:1")]
        aspect: String,

        /// Quality preset (standard, hd, ultra)
        #[arg(long, default_value = "standard")]
        quality: String,

        /// Where to write the image
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Edit an existing image with a prompt
    Edit {
        /// Input image file
        input: PathBuf,

        /// Edit instructions
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Where to write the edited image
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Gallery subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum GalleryCommand {
    /// List saved images
    List,

    /// Write a saved image to a file
    Export {
        /// Gallery item id
        id: String,

        /// Output file
        out: PathBuf,
    },

    /// Delete a saved image
    Delete {
        /// Gallery item id
        id: String,
    },
}

/// Preference subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PrefsCommand {
    /// Show current preferences
    Show,

    /// Change one or more preferences
    Set {
        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Voice (Puck, Charon, Kore, Fenrir, Zephyr)
        #[arg(long)]
        voice: Option<String>,

        /// Learning level
        #[arg(long)]
        level: Option<String>,

        /// Reduce motion (true/false)
        #[arg(long)]
        reduce_motion: Option<bool>,

        /// Theme (dark, light)
        #[arg(long)]
        theme: Option<String>,

        /// Profile picture file (use "none" to clear)
        #[arg(long)]
        picture: Option<String>,
    },
}

/// API key subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum KeyCommand {
    /// Store the API key in the OS keyring
    Set {
        /// API key
        key: String,
    },

    /// Remove the stored API key
    Clear,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Whoami,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(cli.storage_path.is_none());
    }

    #[test]
    fn test_cli_parse_ask_joins_words() {
        let cli = Cli::try_parse_from(["westline", "ask", "hello", "there"]).unwrap();
        match cli.command {
            Commands::Ask { prompt, new, .. } => {
                assert_eq!(prompt.join(" "), "hello there");
                assert!(!new);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_cli_parse_signup() {
        let cli = Cli::try_parse_from([
            "westline",
            "signup",
            "--name",
            "Ada",
            "--email",
            "ada@example.com",
            "--password",
            "secret1",
        ])
        .unwrap();
        match cli.command {
            Commands::Signup {
                name,
                email,
                confirm,
                ..
            } => {
                assert_eq!(name, "Ada");
                assert_eq!(email, "ada@example.com");
                assert!(confirm.is_none());
            }
            _ => panic!("Expected Signup command"),
        }
    }

    #[test]
    fn test_cli_parse_history_rename() {
        let cli =
            Cli::try_parse_from(["westline", "history", "rename", "convo_1", "My", "Title"]).unwrap();
        match cli.command {
            Commands::History {
                command: HistoryCommand::Rename { id, title },
            } => {
                assert_eq!(id, "convo_1");
                assert_eq!(title.join(" "), "My Title");
            }
            _ => panic!("Expected History Rename command"),
        }
    }

    #[test]
    fn test_cli_parse_image_generate_defaults() {
        let cli = Cli::try_parse_from(["westline", "image", "generate", "a", "fox"]).unwrap();
        match cli.command {
            Commands::Image {
                command:
                    ImageCommand::Generate {
                        aspect, quality, ..
                    },
            } => {
                assert_eq!(aspect, "1:1");
                assert_eq!(quality, "standard");
            }
            _ => panic!("Expected Image Generate command"),
        }
    }

    #[test]
    fn test_cli_parse_storage_path_and_verbose() {
        let cli = Cli::try_parse_from([
            "westline",
            "--verbose",
            "--storage-path",
            "/tmp/w.db",
            "whoami",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.storage_path.as_deref(), Some("/tmp/w.db"));
    }

    #[test]
    fn test_cli_ask_requires_prompt() {
        assert!(Cli::try_parse_from(["westline", "ask"]).is_err());
    }

    #[test]
    fn test_cli_ask_new_conflicts_with_conversation() {
        assert!(Cli::try_parse_from(["westline", "ask", "--new", "-c", "convo_1", "hi"]).is_err());
        let cli = Cli::try_parse_from(["westline", "ask", "-c", "convo_1", "hi"]).unwrap();
        match cli.command {
            Commands::Ask { conversation, .. } => {
                assert_eq!(conversation.as_deref(), Some("convo_1"))
            }
            _ => panic!("Expected Ask command"),
        }
    }
}
