use crate::cli::HistoryCommand;
use crate::commands::{
    open_app, print_effect_burst, print_message, require_signed_in, resolve_conversation,
};
use crate::config::Config;
use crate::error::{FieldError, Result, WestlineError};
use crate::models::{Conversation, Feedback};
use colored::Colorize;
use prettytable::{format, Table};

/// Length of the id shown in tables: the prefix plus eight hex digits
const SHORT_ID_LEN: usize = 14;

fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > 40 {
        let head: String = title.chars().take(37).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// Print conversations as a table, marking the active one
pub fn print_conversation_table(conversations: &[&Conversation], active_id: Option<&str>) {
    if conversations.is_empty() {
        println!("{}", "No conversation history found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Pinned".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for conversation in conversations {
        let id = short_id(&conversation.id);
        let id = if Some(conversation.id.as_str()) == active_id {
            format!("* {}", id).green()
        } else {
            id.cyan()
        };
        let pinned = if conversation.is_pinned { "📌" } else { "" };
        let updated = conversation
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            id,
            truncate_title(&conversation.title),
            pinned,
            conversation.messages.len(),
            updated
        ]);
    }

    println!("\nConversation History:");
    table.printstd();
    println!();
}

/// Print a whole conversation
pub fn print_transcript(conversation: &Conversation) {
    let pin = if conversation.is_pinned { " 📌" } else { "" };
    println!(
        "\n{}{} {}\n",
        conversation.title.bold(),
        pin,
        format!("({})", conversation.id).dimmed()
    );
    for message in &conversation.messages {
        print_message(message);
    }
}

/// Handle history commands
pub fn handle_history(config: Config, command: HistoryCommand) -> Result<()> {
    let mut app = open_app(config)?;
    require_signed_in(&app)?;

    let resolve = |app: &crate::app::ChatApp, query: &str| -> Result<String> {
        resolve_conversation(app.session().conversations()?.conversations(), query)
    };

    match command {
        HistoryCommand::List => {
            let store = app.session().conversations()?;
            print_conversation_table(&store.sorted(), None);
            if !store.conversations().is_empty() {
                println!(
                    "Use {} to continue a conversation.",
                    "westline chat --resume <ID>".cyan()
                );
                println!();
            }
        }
        HistoryCommand::Show { id } => {
            let id = resolve(&app, &id)?;
            let store = app.session().conversations()?;
            let conversation = store
                .get(&id)
                .ok_or_else(|| WestlineError::ConversationNotFound(id.clone()))?;
            print_transcript(conversation);
        }
        HistoryCommand::Delete { id } => {
            let id = resolve(&app, &id)?;
            app.delete_conversation(&id)?;
            println!("{}", format!("Deleted conversation {}", id).green());
        }
        HistoryCommand::Pin { id } => {
            let id = resolve(&app, &id)?;
            let pinned = app.toggle_pin(&id)?;
            let verb = if pinned { "Pinned" } else { "Unpinned" };
            println!("{}", format!("{} conversation {}", verb, id).green());
        }
        HistoryCommand::Rename { id, title } => {
            let id = resolve(&app, &id)?;
            let title = title.join(" ");
            app.rename_conversation(&id, &title)?;
            println!("{}", format!("Renamed to \"{}\"", title.trim()).green());
        }
        HistoryCommand::Feedback { message, feedback } => {
            let feedback = Feedback::parse_str(&feedback).map_err(|e| {
                WestlineError::Validation(FieldError::new("feedback", e))
            })?;
            let (current, burst) = app.set_feedback(&message, feedback)?;
            match current {
                Some(f) => println!("{}", format!("Marked {} as {}", message, f).green()),
                None => println!("Cleared feedback on {}", message),
            }
            if let Some(burst) = burst {
                print_effect_burst(&burst);
            }
        }
        HistoryCommand::Clear => {
            app.clear_history()?;
            println!("{}", "Cleared all conversations.".green());
        }
    }

    Ok(())
}
