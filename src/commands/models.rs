//! Model management commands for Neochat
//!
//! This module provides commands for discovering the models available on
//! the server and persisting the one used by future chats.

use crate::commands::AppContext;
use crate::directory::{resolve_selected_model, ModelDescriptor, ModelDirectory};
use crate::error::{NeochatError, Result};
use colored::Colorize;
use prettytable::{cell, row, Table};

/// List available models from the server
///
/// # Arguments
///
/// * `ctx` - Shared command context
/// * `json` - Print the descriptors as JSON instead of a table
///
/// # Returns
///
/// Returns Ok(()) on success, `DirectoryUnavailable` if the listing fails
///
/// # Examples
///
/// ```no_run
/// use neochat::commands::{models::list_models, AppContext};
/// use neochat::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let ctx = AppContext::open(Config::default(), None);
/// list_models(&ctx, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_models(ctx: &AppContext, json: bool) -> Result<()> {
    tracing::info!("Listing models from {}", ctx.server_url());

    let directory = ModelDirectory::new(ctx.backend()?);
    let models = directory.list_models().await?;

    if models.is_empty() {
        if json {
            println!("[]");
        } else {
            println!("No models available from {}", ctx.server_url());
        }
        return Ok(());
    }

    if json {
        output_models_json(&models)?;
    } else {
        let selected = resolve_selected_model(&models, ctx.preferred_model());
        output_models_table(&models, selected.as_deref(), ctx.server_url());
    }

    Ok(())
}

/// Persist `model` as the model for future chats
///
/// The model must be listed by the server.
///
/// # Errors
///
/// Returns `DirectoryUnavailable` if the listing fails and a configuration
/// error if the model is not listed
pub async fn select_model(ctx: &mut AppContext, model: &str) -> Result<()> {
    let directory = ModelDirectory::new(ctx.backend()?);
    let models = directory.list_models().await?;

    let descriptor = find_model(&models, model).ok_or_else(|| {
        NeochatError::Config(format!(
            "Model '{}' is not available on {}",
            model,
            ctx.server_url()
        ))
    })?;

    let id = descriptor.id.clone();
    ctx.settings.save_model(&ctx.gateway, id.clone());
    if !ctx.gateway.is_available() {
        println!(
            "{}",
            "Storage is unavailable; the selection applies to this run only.".yellow()
        );
    }
    println!("{} {}", "Selected model:".green(), id.cyan());
    Ok(())
}

/// Find a model by id, falling back to its display name
fn find_model<'a>(models: &'a [ModelDescriptor], wanted: &str) -> Option<&'a ModelDescriptor> {
    models
        .iter()
        .find(|m| m.id == wanted)
        .or_else(|| models.iter().find(|m| m.name == wanted))
}

/// Serialize a value to pretty JSON
fn serialize_pretty<T: serde::Serialize + ?Sized>(
    value: &T,
) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Output models in JSON format
///
/// # Errors
///
/// Returns `NeochatError::Serialization` if serialization fails
fn output_models_json(models: &[ModelDescriptor]) -> Result<()> {
    let json = serialize_pretty(models).map_err(NeochatError::Serialization)?;
    println!("{}", json);
    Ok(())
}

/// Output models in table format, marking the selected one
fn output_models_table(models: &[ModelDescriptor], selected: Option<&str>, server: &str) {
    let mut table = Table::new();
    table.add_row(row!["", "Name", "ID", "Arch", "Size", "Format", "Link"]);

    for model in models {
        let marker = if selected == Some(model.id.as_str()) {
            "*"
        } else {
            ""
        };
        table.add_row(row![
            marker,
            model.name,
            model.id,
            model.arch,
            model.size,
            model.format,
            model.link
        ]);
    }

    println!("\nAvailable models from {}:\n", server);
    table.printstd();
    println!();
}
