//! Speech synthesis command handler

use crate::commands::{open_app, require_signed_in};
use crate::config::Config;
use crate::error::{FieldError, Result, WestlineError};
use crate::models::{Sender, Voice};
use colored::Colorize;
use std::path::PathBuf;

/// Speak text, or the last reply of the most recent conversation, to a WAV file
///
/// # Arguments
///
/// * `config` - Global configuration (consumed)
/// * `text` - Words to speak; empty means the last reply
/// * `voice` - Optional voice override
/// * `out` - Output WAV path
pub async fn run_speak(
    config: Config,
    text: Vec<String>,
    voice: Option<String>,
    out: PathBuf,
) -> Result<()> {
    let mut app = open_app(config)?;
    require_signed_in(&app)?;

    let voice = match voice {
        Some(v) => Voice::parse_str(&v)
            .map_err(|e| WestlineError::Validation(FieldError::new("voice", e)))?,
        None => app.session().require_user()?.voice(),
    };

    let audio = if text.is_empty() {
        let last_reply = app
            .session()
            .conversations()?
            .active()
            .and_then(|c| {
                c.messages
                    .iter()
                    .rev()
                    .find(|m| m.sender == Sender::Bot && m.is_final)
            })
            .map(|m| (m.id.clone(), m.text.clone()));
        let Some((message_id, reply)) = last_reply else {
            println!("{}", "Nothing to speak yet.".yellow());
            return Ok(());
        };
        if voice == app.session().require_user()?.voice() {
            app.speak_message(&message_id).await?
        } else {
            app.speak_text_as(&reply, voice).await?
        }
    } else {
        app.speak_text_as(&text.join(" "), voice).await?
    };

    match audio {
        Some(audio) => {
            audio.save_wav(&out)?;
            println!(
                "{}",
                format!(
                    "Saved {:.1}s of speech ({}) to {}",
                    audio.duration().as_secs_f32(),
                    voice,
                    out.display()
                )
                .green()
            );
        }
        None => println!("{}", "Speech is unavailable right now.".yellow()),
    }
    Ok(())
}
