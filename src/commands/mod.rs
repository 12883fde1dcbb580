/*!
Command handlers for the CLI

This module provides the command handlers invoked by the CLI entrypoint.

The inline modules cover the interactive chat loop (`chat`), one-shot
messages (`ask`) and account flows (`account`). History, images, speech
and preferences live in their own files.

Every handler builds a [`ChatApp`] over the SQLite store and the configured
gateway, restores the persisted session and then acts on it.
*/

use crate::app::ChatApp;
use crate::config::Config;
use crate::effects::EffectBurst;
use crate::error::{FieldError, Result, WestlineError};
use crate::gateway::{create_gateway, StreamEvent};
use crate::models::{Conversation, Message, Sender, DEFAULT_CONVERSATION_TITLE};
use crate::storage::{KeyValueStore, SqliteStore};
use chrono::Utc;
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;

// Slash commands for interactive chat
pub mod special_commands;

// Conversation history commands
pub mod history;

// Image generation, editing and gallery commands
pub mod image;

// Speech synthesis command
pub mod speak;

// Preferences, premium and API key commands
pub mod prefs;

/// Build the application over the configured SQLite store and gateway
///
/// The session is left on the splash screen.
pub fn build_app(config: Config) -> Result<ChatApp> {
    let store: Arc<dyn KeyValueStore> = match &config.storage.path {
        Some(path) => Arc::new(SqliteStore::new_with_path(path)?),
        None => Arc::new(SqliteStore::new()?),
    };
    let gateway = create_gateway(&config.gateway)?;
    Ok(ChatApp::new(config, store, gateway))
}

/// Build the application and restore the persisted session right away
pub fn open_app(config: Config) -> Result<ChatApp> {
    let mut app = build_app(config)?;
    app.session_mut().init(Utc::now())?;
    Ok(app)
}

/// Fail with a sign-in hint unless a user is signed in
pub fn require_signed_in(app: &ChatApp) -> Result<()> {
    if app.session().user().is_none() {
        eprintln!(
            "{}",
            "Sign in first with `westline login`, `westline signup` or `westline social-login`."
                .yellow()
        );
        return Err(WestlineError::NotAuthenticated.into());
    }
    Ok(())
}

/// Resolve a conversation by exact id or unique id prefix
///
/// # Arguments
///
/// * `conversations` - Conversations to search
/// * `query` - Full id or a prefix of one
///
/// # Returns
///
/// The full conversation id
///
/// # Errors
///
/// `ConversationNotFound` when nothing matches, a validation error when the
/// prefix matches more than one conversation
pub fn resolve_conversation(conversations: &[Conversation], query: &str) -> Result<String> {
    let query = query.trim();
    if let Some(exact) = conversations.iter().find(|c| c.id == query) {
        return Ok(exact.id.clone());
    }
    let matches: Vec<&Conversation> = conversations
        .iter()
        .filter(|c| !query.is_empty() && c.id.starts_with(query))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => Err(WestlineError::ConversationNotFound(query.to_string()).into()),
        _ => Err(WestlineError::Validation(FieldError::new(
            "conversation",
            format!("'{}' matches {} conversations.", query, matches.len()),
        ))
        .into()),
    }
}

/// Print a stream event as it arrives
fn print_stream_event(event: &StreamEvent) {
    match event {
        StreamEvent::TextFragment(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        StreamEvent::AssetAttachment { caption, image } => {
            println!("{}", caption);
            println!("{}", format!("[image: {}]", image.mime_type).dimmed());
        }
    }
}

/// Print what a shockwave would look and feel like
fn print_effect_burst(burst: &EffectBurst) {
    if burst.shake == chrono::Duration::zero() {
        tracing::debug!("Shockwave with reduced motion");
    } else {
        println!("{}", "⚡ *the screen shakes* ⚡".bright_yellow().bold());
    }
    let pattern: Vec<String> = burst.haptic.iter().map(|ms| ms.to_string()).collect();
    tracing::debug!("Haptic pattern: {}", pattern.join("-"));
}

/// Print a finished reply's trailer: failure notice and message id
fn print_reply_trailer(reply: Option<&Message>, failed: bool) {
    println!();
    if let Some(reply) = reply {
        if failed {
            println!("{}", reply.text.red());
        }
        println!("{}", format!("(reply id: {})", reply.id).dimmed());
    }
}

/// Print one message of a transcript
fn print_message(message: &Message) {
    let speaker = match message.sender {
        Sender::User => "You".cyan().bold(),
        Sender::Bot => "WestlineGPT".magenta().bold(),
    };
    let feedback = match message.feedback {
        Some(f) => format!(" [{}]", f),
        None => String::new(),
    };
    println!(
        "{} {}{}",
        speaker,
        format!("({})", message.id).dimmed(),
        feedback.yellow()
    );
    if let Some(image) = &message.image {
        println!("{}", format!("[image: {}]", image.mime_type).dimmed());
    }
    println!("{}\n", message.text);
}

// One-shot message command handler
pub mod ask {
    //! Send a single message and stream the reply to stdout.

    use super::*;
    use crate::models::Aura;

    /// Send one message
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `prompt` - Message words, joined with spaces
    /// * `new` - Start a new conversation
    /// * `conversation` - Continue this conversation (id or unique prefix)
    /// * `aura` - Optional aura persona
    ///
    /// Without `new` or `conversation` the most recent conversation is
    /// continued.
    pub async fn run_ask(
        config: Config,
        prompt: Vec<String>,
        new: bool,
        conversation: Option<String>,
        aura: Option<String>,
    ) -> Result<()> {
        let text = prompt.join(" ");
        let mut app = open_app(config)?;
        require_signed_in(&app)?;

        if let Some(aura) = aura {
            let aura = Aura::parse_str(&aura)
                .map_err(|e| WestlineError::Validation(FieldError::new("aura", e)))?;
            app.effects_mut().set_aura(aura);
        }

        if new {
            app.new_chat()?;
        } else if let Some(query) = conversation {
            let id = resolve_conversation(app.session().conversations()?.conversations(), &query)?;
            app.select_conversation(&id)?;
        }

        tracing::info!("Sending one-shot message");
        let outcome = app.send_with(&text, Default::default(), print_stream_event).await?;
        print_reply_trailer(outcome.reply.as_ref(), outcome.failed);

        if outcome.created_conversation {
            let title = outcome.title.as_deref().unwrap_or(DEFAULT_CONVERSATION_TITLE);
            println!(
                "{}",
                format!("Started \"{}\" ({})", title, outcome.conversation_id).dimmed()
            );
        }
        if let Some(suggestion) = outcome.aura_suggestion {
            println!(
                "{}",
                format!(
                    "{} Try the {} aura with --aura \"{}\".",
                    suggestion.reason, suggestion.aura, suggestion.aura
                )
                .cyan()
            );
        }
        if outcome.suggest_premium {
            println!(
                "{}",
                "Enjoying the chat? Unlock smarter replies with `westline premium <code>`.".yellow()
            );
        }
        Ok(())
    }
}

// Account command handlers
pub mod account {
    //! Sign-up, sign-in, password reset, sign-out and account details.

    use super::*;
    use crate::auth::AuthProvider;
    use crate::session::Screen;

    fn sign_out_existing(app: &mut ChatApp) -> Result<()> {
        if let Some(user) = app.session().user() {
            println!("{}", format!("Signing out {}", user.email).dimmed());
            app.logout()?;
        }
        Ok(())
    }

    /// Create an account and sign in
    pub fn signup(
        config: Config,
        name: String,
        email: String,
        password: String,
        confirm: Option<String>,
    ) -> Result<()> {
        let mut app = open_app(config)?;
        sign_out_existing(&mut app)?;
        let confirm = confirm.unwrap_or_else(|| password.clone());

        let session = app.session_mut();
        session.navigate(Screen::SignUp)?;
        let user = session.sign_up(&name, &email, &password, &confirm, Utc::now())?;
        println!(
            "{}",
            format!("Welcome to WestlineGPT, {}!", user.name).green()
        );
        Ok(())
    }

    /// Sign in with email and password
    pub fn login(config: Config, email: String, password: String) -> Result<()> {
        let mut app = open_app(config)?;
        sign_out_existing(&mut app)?;

        let session = app.session_mut();
        session.navigate(Screen::Login)?;
        let user = session.login(&email, &password, Utc::now())?;
        println!("{}", format!("Welcome back, {}!", user.name).green());
        Ok(())
    }

    /// Sign in with the social provider using the confirmed details
    pub fn social_login(config: Config, name: String, email: String) -> Result<()> {
        let mut app = open_app(config)?;
        sign_out_existing(&mut app)?;

        let user = app.session_mut().sign_in_with_provider(
            AuthProvider::Google,
            &name,
            &email,
            Utc::now(),
        )?;
        println!(
            "{}",
            format!("Signed in with {} as {}", AuthProvider::Google, user.email).green()
        );
        Ok(())
    }

    /// Request a password reset link
    pub fn forgot_password(config: Config, email: String) -> Result<()> {
        let mut app = open_app(config)?;
        if let Some(user) = app.session().user() {
            println!(
                "{}",
                format!("Already signed in as {}. Sign out first.", user.email).yellow()
            );
            return Ok(());
        }

        let session = app.session_mut();
        session.navigate(Screen::Login)?;
        session.navigate(Screen::ForgotPassword)?;
        let notice = session.forgot_password(&email)?;
        println!("{}", notice);
        Ok(())
    }

    /// Sign out
    pub fn logout(config: Config) -> Result<()> {
        let mut app = open_app(config)?;
        if app.session().user().is_none() {
            println!("{}", "Not signed in.".yellow());
            return Ok(());
        }
        app.logout()?;
        println!("{}", "Signed out.".green());
        Ok(())
    }

    /// Show the signed-in account and image usage
    pub fn whoami(config: Config) -> Result<()> {
        let app = open_app(config)?;
        let Some(user) = app.session().user() else {
            println!("{}", "Not signed in.".yellow());
            return Ok(());
        };

        let tier = if user.is_premium {
            "Premium".bright_yellow().bold()
        } else {
            "Free".normal()
        };
        println!("{} <{}>", user.name.bold(), user.email);
        println!("Plan:   {}", tier);
        println!("Level:  {}", user.learning_level());
        println!("Voice:  {}", user.voice());
        println!("Theme:  {}", user.theme);
        print_usage(&app)?;
        Ok(())
    }

    /// Print remaining image actions
    pub fn print_usage(app: &ChatApp) -> Result<()> {
        let usage = app.usage_status(Utc::now())?;
        let show = |remaining: Option<u32>| match remaining {
            Some(n) => n.to_string(),
            None => "unlimited".to_string(),
        };
        println!("Images: {} generations, {} edits left", show(usage.generate_remaining), show(usage.edit_remaining));
        if let Some(renews_at) = usage.renews_at {
            println!(
                "Renews: {}",
                renews_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
            );
        }
        Ok(())
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Restores the session, then runs a readline loop that streams replies
    //! and handles slash commands. Errors are printed and the loop goes on.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::app::SendOptions;
    use crate::chat::preferences::{PreferencesPatch, ProfilePatch};
    use crate::effects::SuggestionOutcome;
    use crate::models::{Aura, LearningLevel};
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::path::Path;

    /// Where `/speak` writes its audio
    pub const SPEECH_FILE: &str = "westline-speech.wav";

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `level` - Optional learning level for this session
    /// * `aura` - Optional aura for this session
    /// * `resume` - Optional conversation to continue (id or unique prefix)
    pub async fn run_chat(
        config: Config,
        level: Option<String>,
        aura: Option<String>,
        resume: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let mut app = build_app(config)?;
        app.session_mut().boot().await?;
        require_signed_in(&app)?;

        if let Some(level) = level {
            let level = LearningLevel::parse_str(&level)
                .map_err(|e| WestlineError::Validation(FieldError::new("level", e)))?;
            app.update_profile(&ProfilePatch {
                preferences: PreferencesPatch {
                    learning_level: Some(level),
                    ..Default::default()
                },
                ..Default::default()
            })?;
        }
        if let Some(aura) = aura {
            let aura = Aura::parse_str(&aura)
                .map_err(|e| WestlineError::Validation(FieldError::new("aura", e)))?;
            app.effects_mut().set_aura(aura);
        }
        if let Some(user) = app.session().user() {
            let reduce_motion = user.preferences.reduce_motion;
            app.effects_mut().set_reduce_motion(reduce_motion);
        }

        match resume {
            Some(query) => {
                let id =
                    resolve_conversation(app.session().conversations()?.conversations(), &query)?;
                app.select_conversation(&id)?;
                if let Some(conversation) = app.session().conversations()?.get(&id) {
                    history::print_transcript(conversation);
                }
            }
            None => app.new_chat()?,
        }

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&app);
        print_quick_prompts(&app).await;

        loop {
            let prompt = format!("{} >> ", aura_tag(app.effects().aura()));
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {
                            let text = offer_aura_sync(&app, &mut rl, trimmed);
                            if let Err(e) = send(&mut app, &text).await {
                                eprintln!("{}", format!("Error: {}", e).red());
                            }
                        }
                        Ok(command) => {
                            if let Err(e) = handle_special_command(&mut app, command).await {
                                eprintln!("{}", format!("Error: {}", e).red());
                            }
                        }
                        Err(e) => eprintln!("{}", e.to_string().red()),
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

        println!("Goodbye!");
        Ok(())
    }

    /// Offer the Aura Sync prompt before sending and return the text to send
    fn offer_aura_sync(app: &ChatApp, rl: &mut DefaultEditor, text: &str) -> String {
        let Some(enhanced) = app.aura_sync_suggestion(text) else {
            return text.to_string();
        };
        println!("{}", format!("Aura sync: \"{}\"", enhanced).bright_red());
        let answer = rl
            .readline("Send the synced prompt instead? [y/N] ")
            .unwrap_or_default();
        choose_prompt(text, &enhanced, &answer)
    }

    /// Pick the enhanced prompt only on an explicit yes
    pub(crate) fn choose_prompt(original: &str, enhanced: &str, answer: &str) -> String {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => enhanced.to_string(),
            _ => original.to_string(),
        }
    }

    async fn send(app: &mut ChatApp, text: &str) -> Result<()> {
        println!();
        let outcome = app
            .send_with(text, SendOptions::default(), print_stream_event)
            .await?;
        print_reply_trailer(outcome.reply.as_ref(), outcome.failed);

        if let Some(title) = &outcome.title {
            println!("{}", format!("Conversation titled \"{}\"", title).dimmed());
        }
        if let Some(suggestion) = outcome.aura_suggestion {
            println!(
                "{}",
                format!(
                    "{} Switch to the {} aura? Type /accept or /dismiss.",
                    suggestion.reason, suggestion.aura
                )
                .cyan()
            );
        }
        if outcome.suggest_premium {
            println!(
                "{}",
                "Enjoying the chat? Unlock smarter replies with `westline premium <code>`.".yellow()
            );
        }
        println!();
        Ok(())
    }

    fn active_id(app: &ChatApp) -> Result<String> {
        app.session()
            .conversations()?
            .active_id()
            .map(str::to_string)
            .ok_or_else(|| {
                WestlineError::ConversationNotFound("no active conversation".to_string()).into()
            })
    }

    async fn handle_special_command(app: &mut ChatApp, command: SpecialCommand) -> Result<()> {
        match command {
            SpecialCommand::NewChat => {
                app.new_chat()?;
                println!("{}", "Started a new chat.".green());
                print_quick_prompts(app).await;
            }
            SpecialCommand::ListConversations => {
                let store = app.session().conversations()?;
                history::print_conversation_table(&store.sorted(), store.active_id());
            }
            SpecialCommand::Switch(query) => {
                let id =
                    resolve_conversation(app.session().conversations()?.conversations(), &query)?;
                app.select_conversation(&id)?;
                if let Some(conversation) = app.session().conversations()?.get(&id) {
                    history::print_transcript(conversation);
                }
            }
            SpecialCommand::SetLevel(level) => {
                println!("{}", format!("Learning level: {}", level).cyan());
                let (burst, outcome) = app.change_learning_level(level).await?;
                print_effect_burst(&burst);
                if let Some(reply) = &outcome.reply {
                    println!("\n{}", reply.text);
                }
                print_reply_trailer(outcome.reply.as_ref(), outcome.failed);
            }
            SpecialCommand::SetAura(aura) => {
                app.effects_mut().set_aura(aura);
                println!("Aura: {}", aura_tag(aura));
            }
            SpecialCommand::SetIntensity(intensity) => {
                app.effects_mut().set_intensity(intensity);
                println!(
                    "Intensity: {} ({} particles)",
                    intensity,
                    app.effects().particle_count()
                );
            }
            SpecialCommand::TogglePin => {
                let id = active_id(app)?;
                let pinned = app.toggle_pin(&id)?;
                println!("{}", if pinned { "Pinned." } else { "Unpinned." });
            }
            SpecialCommand::Rename(title) => {
                let id = active_id(app)?;
                app.rename_conversation(&id, &title)?;
                println!("{}", format!("Renamed to \"{}\"", title.trim()).green());
            }
            SpecialCommand::Delete => {
                let id = active_id(app)?;
                app.delete_conversation(&id)?;
                println!("{}", "Conversation deleted.".green());
                if let Some(active) = app.session().conversations()?.active() {
                    println!("Now in \"{}\"", active.title);
                }
            }
            SpecialCommand::Feedback {
                message_id,
                feedback,
            } => {
                let (current, burst) = app.set_feedback(&message_id, feedback)?;
                match current {
                    Some(f) => println!("Marked {} as {}", message_id, f),
                    None => println!("Cleared feedback on {}", message_id),
                }
                if let Some(burst) = burst {
                    print_effect_burst(&burst);
                }
            }
            SpecialCommand::QuickPrompts => print_quick_prompts(app).await,
            SpecialCommand::Speak => {
                let last_reply = app
                    .session()
                    .conversations()?
                    .active()
                    .and_then(|c| c.messages.iter().rev().find(|m| m.sender == Sender::Bot))
                    .map(|m| m.id.clone());
                let Some(message_id) = last_reply else {
                    println!("{}", "Nothing to speak yet.".yellow());
                    return Ok(());
                };
                match app.speak_message(&message_id).await? {
                    Some(audio) => {
                        audio.save_wav(Path::new(SPEECH_FILE))?;
                        println!(
                            "{}",
                            format!(
                                "Saved {:.1}s of speech to {}",
                                audio.duration().as_secs_f32(),
                                SPEECH_FILE
                            )
                            .green()
                        );
                    }
                    None => println!("{}", "Speech is unavailable right now.".yellow()),
                }
            }
            SpecialCommand::AcceptSuggestion => {
                let is_premium = app.session().require_user()?.is_premium;
                match app.effects_mut().accept_suggestion(is_premium) {
                    SuggestionOutcome::Applied(aura) => println!("Aura: {}", aura_tag(aura)),
                    SuggestionOutcome::PremiumRequired(aura) => println!(
                        "{}",
                        format!("The {} aura is a premium feature.", aura).yellow()
                    ),
                    SuggestionOutcome::NoSuggestion => println!("No aura suggestion pending."),
                }
            }
            SpecialCommand::DismissSuggestion => {
                app.effects_mut().dismiss_suggestion();
            }
            SpecialCommand::Status => print_status(app)?,
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit | SpecialCommand::None => {}
        }
        Ok(())
    }

    async fn print_quick_prompts(app: &ChatApp) {
        match app.quick_prompts().await {
            Ok(prompts) => {
                println!("{}", "Try asking:".bold());
                for prompt in prompts {
                    println!("  • {}", prompt);
                }
                println!();
            }
            Err(e) => tracing::warn!("Could not load quick prompts: {}", e),
        }
    }

    fn aura_tag(aura: Aura) -> colored::ColoredString {
        let name = aura.as_str();
        match aura {
            Aura::Off => "westline".normal(),
            Aura::Rain => name.blue(),
            Aura::IceDrip => name.bright_cyan(),
            Aura::Lava => name.red(),
            Aura::Steam => name.white(),
            Aura::Fire => name.bright_red().bold(),
        }
    }

    fn print_welcome_banner(app: &ChatApp) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                 WestlineGPT - Welcome!                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        if let Some(user) = app.session().user() {
            println!("Hi {}! Level: {}", user.name.bold(), user.learning_level());
        }
        println!("Aura: {}\n", aura_tag(app.effects().aura()));
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    fn print_status(app: &ChatApp) -> Result<()> {
        let user = app.session().require_user()?;
        let effects = app.effects();

        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                        Session Status                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("User:      {} <{}>", user.name, user.email);
        println!(
            "Plan:      {}",
            if user.is_premium { "Premium" } else { "Free" }
        );
        println!("Level:     {}", user.learning_level());
        println!(
            "Aura:      {} ({}, {} particles)",
            aura_tag(effects.aura()),
            effects.intensity(),
            effects.particle_count()
        );
        let store = app.session().conversations()?;
        println!("Chats:     {}", store.conversations().len());
        if let Some(active) = store.active() {
            println!("Current:   {} ({} messages)", active.title, active.messages.len());
        }
        account::print_usage(app)?;
        println!();
        Ok(())
    }
}
