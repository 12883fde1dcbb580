//! Image generation, editing and gallery command handlers

use crate::app::{attachment_from_bytes, ChatApp, ImageOutcome};
use crate::cli::{GalleryCommand, ImageCommand};
use crate::commands::{open_app, require_signed_in};
use crate::config::Config;
use crate::error::{FieldError, Result, WestlineError};
use crate::models::{AspectRatio, ImageAttachment, ImageQuality};
use colored::Colorize;
use prettytable::{format, Table};
use std::path::{Path, PathBuf};

/// File extension for an image MIME type
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "png",
    }
}

/// Default output path: `westline-<stem>.<ext>` in the working directory
fn default_output(stem: &str, image: &ImageAttachment) -> PathBuf {
    PathBuf::from(format!(
        "westline-{}.{}",
        stem,
        extension_for(&image.mime_type)
    ))
}

fn write_image(image: &ImageAttachment, path: &Path) -> Result<()> {
    let bytes = image.decode()?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn invalid(field: &'static str, message: String) -> anyhow::Error {
    WestlineError::Validation(FieldError::new(field, message)).into()
}

/// Report an image outcome, writing the image when there is one
fn report_outcome(outcome: ImageOutcome, out: Option<PathBuf>, stem: &str) -> Result<()> {
    match outcome {
        ImageOutcome::Ready {
            image,
            gallery_item,
        } => {
            let path = out.unwrap_or_else(|| default_output(stem, &image));
            write_image(&image, &path)?;
            println!("{}", format!("Saved image to {}", path.display()).green());
            if let Some(item) = gallery_item {
                println!("{}", format!("Added to your gallery as {}", item.id).dimmed());
            }
        }
        ImageOutcome::LimitReached { kind, renews_at } => {
            println!(
                "{}",
                format!(
                    "You've reached your {} limit. It renews at {}.",
                    kind,
                    renews_at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                )
                .yellow()
            );
            println!("Unlock unlimited images with `westline premium <code>`.");
        }
        ImageOutcome::Failed(message) => println!("{}", message.red()),
    }
    Ok(())
}

/// Handle image commands
pub async fn handle_image(config: Config, command: ImageCommand) -> Result<()> {
    let mut app = open_app(config)?;
    require_signed_in(&app)?;

    match command {
        ImageCommand::Generate {
            prompt,
            aspect,
            quality,
            out,
        } => {
            let aspect = AspectRatio::parse_str(&aspect).map_err(|e| invalid("aspect", e))?;
            let quality = ImageQuality::parse_str(&quality).map_err(|e| invalid("quality", e))?;
            let prompt = if prompt.is_empty() {
                let surprise = app.surprise_prompt().to_string();
                println!("{}", format!("Surprise prompt: {}", surprise).cyan());
                surprise
            } else {
                prompt.join(" ")
            };

            println!("{}", "Generating...".dimmed());
            let outcome = app.generate_image(&prompt, aspect, quality).await?;
            report_outcome(outcome, out, "image")
        }
        ImageCommand::Edit { input, prompt, out } => {
            let source = load_image(&input)?;
            println!("{}", "Editing...".dimmed());
            let outcome = app.edit_image(&source, &prompt.join(" ")).await?;
            report_outcome(outcome, out, "edit")
        }
    }
}

/// Read an image file into an attachment
pub fn load_image(path: &Path) -> Result<ImageAttachment> {
    let bytes = std::fs::read(path).map_err(|e| {
        WestlineError::Validation(FieldError::new(
            "image",
            format!("Cannot read {}: {}", path.display(), e),
        ))
    })?;
    attachment_from_bytes(&bytes)
}

fn print_gallery(app: &ChatApp) -> Result<()> {
    let items = app.gallery_items()?;
    if items.is_empty() {
        println!("{}", "Your gallery is empty.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Prompt".bold(),
        "Type".bold(),
        "Created".bold()
    ]);

    for item in items {
        let prompt = if item.prompt.chars().count() > 50 {
            let head: String = item.prompt.chars().take(47).collect();
            format!("{}...", head)
        } else {
            item.prompt.clone()
        };
        let created = item
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        table.add_row(prettytable::row![item.id.cyan(), prompt, item.mime_type, created]);
    }

    println!("\nGallery:");
    table.printstd();
    println!();
    Ok(())
}

/// Handle gallery commands
pub fn handle_gallery(config: Config, command: GalleryCommand) -> Result<()> {
    let mut app = open_app(config)?;
    require_signed_in(&app)?;

    match command {
        GalleryCommand::List => print_gallery(&app)?,
        GalleryCommand::Export { id, out } => {
            let item = app
                .gallery_item(&id)?
                .ok_or_else(|| invalid("id", format!("No gallery image with id {}", id)))?;
            let image = ImageAttachment {
                data: item.data,
                mime_type: item.mime_type,
            };
            write_image(&image, &out)?;
            println!("{}", format!("Exported {} to {}", id, out.display()).green());
        }
        GalleryCommand::Delete { id } => {
            let remaining = app.delete_gallery_item(&id)?;
            println!(
                "{}",
                format!("Deleted {} ({} images left)", id, remaining.len()).green()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_dir;

    #[test]
    fn test_extension_for_known_types() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("application/octet-stream"), "png");
    }

    #[test]
    fn test_write_and_load_png() {
        let dir = temp_dir();
        let path = dir.path().join("dot.png");

        let mut png = Vec::new();
        image::RgbImage::new(1, 1)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        write_image(&ImageAttachment::from_bytes("image/png", &png), &path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.mime_type, "image/png");
        assert_eq!(loaded.decode().unwrap(), png);
    }

    #[test]
    fn test_load_image_rejects_non_images() {
        let dir = temp_dir();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just text").unwrap();
        assert!(load_image(&path).is_err());
        assert!(load_image(&dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_default_output_uses_mime_extension() {
        let image = ImageAttachment::from_base64("image/jpeg", "AAAA");
        assert_eq!(default_output("edit", &image), PathBuf::from("westline-edit.jpg"));
    }
}
