//! Preferences, premium and API key command handlers

use crate::chat::preferences::{PreferencesPatch, ProfilePatch};
use crate::cli::{KeyCommand, PrefsCommand};
use crate::commands::image::load_image;
use crate::commands::{open_app, print_effect_burst, require_signed_in};
use crate::config::Config;
use crate::error::{FieldError, Result, WestlineError};
use crate::gateway::gemini;
use crate::models::{LearningLevel, Theme, Voice};
use colored::Colorize;
use std::path::Path;

fn invalid(field: &'static str, message: String) -> anyhow::Error {
    WestlineError::Validation(FieldError::new(field, message)).into()
}

/// Build a profile patch from `prefs set` arguments
///
/// `picture` is a path to an image file, or `none` to clear the picture.
pub fn build_patch(
    name: Option<String>,
    voice: Option<String>,
    level: Option<String>,
    reduce_motion: Option<bool>,
    theme: Option<String>,
    picture: Option<String>,
) -> Result<ProfilePatch> {
    let profile_picture = match picture.as_deref() {
        None => None,
        Some(p) if p.eq_ignore_ascii_case("none") => Some(None),
        Some(p) => Some(Some(load_image(Path::new(p))?.data)),
    };

    Ok(ProfilePatch {
        name,
        profile_picture,
        theme: theme
            .map(|t| Theme::parse_str(&t).map_err(|e| invalid("theme", e)))
            .transpose()?,
        preferences: PreferencesPatch {
            reduce_motion,
            voice: voice
                .map(|v| Voice::parse_str(&v).map_err(|e| invalid("voice", e)))
                .transpose()?,
            learning_level: level
                .map(|l| LearningLevel::parse_str(&l).map_err(|e| invalid("level", e)))
                .transpose()?,
        },
    })
}

/// Handle preference commands
pub fn handle_prefs(config: Config, command: PrefsCommand) -> Result<()> {
    let mut app = open_app(config)?;
    require_signed_in(&app)?;

    match command {
        PrefsCommand::Show => {
            let user = app.session().require_user()?;
            let prefs = &user.preferences;
            println!("Name:          {}", user.name);
            println!("Theme:         {}", user.theme);
            println!("Voice:         {}", user.voice());
            println!("Level:         {}", user.learning_level());
            println!("Reduce motion: {}", prefs.reduce_motion);
            println!(
                "Picture:       {}",
                if user.profile_picture.is_some() { "set" } else { "none" }
            );
            println!("{}", format!("(preferences version {})", prefs.version).dimmed());
        }
        PrefsCommand::Set {
            name,
            voice,
            level,
            reduce_motion,
            theme,
            picture,
        } => {
            let patch = build_patch(name, voice, level, reduce_motion, theme, picture)?;
            if app.update_profile(&patch)? {
                println!("{}", "Preferences updated.".green());
            } else {
                println!("Nothing changed.");
            }
        }
    }
    Ok(())
}

/// Unlock premium with an access code
pub fn run_premium(config: Config, code: String) -> Result<()> {
    let mut app = open_app(config)?;
    require_signed_in(&app)?;

    if app.session().require_user()?.is_premium {
        println!("{}", "You already have premium.".green());
        return Ok(());
    }
    match app.unlock_premium(code.trim())? {
        Some(burst) => {
            print_effect_burst(&burst);
            println!("{}", "Premium unlocked! Enjoy unlimited images and the smarter model.".bright_yellow().bold());
        }
        None => println!("{}", "Invalid access code.".red()),
    }
    Ok(())
}

/// Handle API key commands
pub fn handle_key(command: KeyCommand) -> Result<()> {
    match command {
        KeyCommand::Set { key } => {
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid("key", "API key cannot be empty.".to_string()));
            }
            gemini::store_api_key(key)?;
            println!("{}", "API key stored in the system keyring.".green());
        }
        KeyCommand::Clear => {
            gemini::clear_api_key()?;
            println!("API key cleared.");
        }
    }
    Ok(())
}
