//! Westline - WestlineGPT in the terminal
//!
#![doc = "Westline - WestlineGPT in the terminal"]
#![doc = "Main entry point for the Westline application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use westline::cli::{Cli, Commands};
use westline::commands;
use westline::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing
    init_tracing(cli.verbose, config.logging.json);

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            level,
            aura,
            resume,
        } => {
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            commands::chat::run_chat(config, level, aura, resume).await?;
            Ok(())
        }
        Commands::Ask {
            prompt,
            new,
            conversation,
            aura,
        } => {
            commands::ask::run_ask(config, prompt, new, conversation, aura).await?;
            Ok(())
        }
        Commands::Signup {
            name,
            email,
            password,
            confirm,
        } => {
            tracing::info!("Creating account");
            commands::account::signup(config, name, email, password, confirm)?;
            Ok(())
        }
        Commands::Login { email, password } => {
            tracing::info!("Signing in");
            commands::account::login(config, email, password)?;
            Ok(())
        }
        Commands::SocialLogin { name, email } => {
            tracing::info!("Signing in with provider");
            commands::account::social_login(config, name, email)?;
            Ok(())
        }
        Commands::ForgotPassword { email } => {
            commands::account::forgot_password(config, email)?;
            Ok(())
        }
        Commands::Logout => {
            commands::account::logout(config)?;
            Ok(())
        }
        Commands::Whoami => {
            commands::account::whoami(config)?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::debug!("Starting history command");
            commands::history::handle_history(config, command)?;
            Ok(())
        }
        Commands::Image { command } => {
            tracing::debug!("Starting image command");
            commands::image::handle_image(config, command).await?;
            Ok(())
        }
        Commands::Gallery { command } => {
            commands::image::handle_gallery(config, command)?;
            Ok(())
        }
        Commands::Speak { text, voice, out } => {
            commands::speak::run_speak(config, text, voice, out).await?;
            Ok(())
        }
        Commands::Prefs { command } => {
            commands::prefs::handle_prefs(config, command)?;
            Ok(())
        }
        Commands::Premium { code } => {
            commands::prefs::run_premium(config, code)?;
            Ok(())
        }
        Commands::Key { command } => {
            commands::prefs::handle_key(command)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug output. Logs go to
/// stderr so command output stays clean.
fn init_tracing(verbose: bool, json: bool) {
    let default_directive = if verbose {
        "westline=debug"
    } else {
        "westline=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
