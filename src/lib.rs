//! Westline - WestlineGPT conversational assistant library
//!
//! This library provides the core of WestlineGPT: accounts and session
//! routing, conversation management with streamed replies, image quotas,
//! cosmetic effects and the generative AI gateway.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `app`: `ChatApp`, the controller wiring everything together
//! - `session`: Screen routing and the signed-in session
//! - `auth`: Mock accounts, the session pointer and form validation
//! - `chat`: Conversation store, reply assembly, quotas, preferences, gallery
//! - `effects`: Aura, shockwave and aura suggestions
//! - `gateway`: AI gateway trait, persona prompts and the Gemini client
//! - `storage`: Key-value storage backends
//! - `audio`: Speech payload decoding and WAV export
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use westline::gateway::create_gateway;
//! use westline::storage::SqliteStore;
//! use westline::{ChatApp, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let gateway = create_gateway(&config.gateway)?;
//!     let mut app = ChatApp::new(config, Arc::new(SqliteStore::new()?), gateway);
//!     app.session_mut().boot().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod audio;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod effects;
pub mod error;
pub mod gateway;
pub mod models;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use app::ChatApp;
pub use config::Config;
pub use error::{Result, WestlineError};
pub use session::{Screen, SessionController};

#[cfg(test)]
pub mod test_utils;
