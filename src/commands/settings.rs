//! Settings command handler

use crate::cli::SettingsCommand;
use crate::commands::AppContext;
use crate::error::Result;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle settings commands
pub fn handle_settings(ctx: &mut AppContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            show_settings(ctx);
            Ok(())
        }
        SettingsCommand::SetUrl { url } => set_server_url(ctx, &url),
    }
}

fn show_settings(ctx: &AppContext) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row!["Setting".bold(), "Value".bold()]);
    for (name, value) in settings_rows(ctx) {
        table.add_row(prettytable::row![name, value]);
    }

    println!("\nSession Settings:");
    table.printstd();
    println!();
}

fn settings_rows(ctx: &AppContext) -> Vec<(&'static str, String)> {
    let storage = if ctx.gateway.is_available() {
        ctx.config
            .storage
            .resolved_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    } else {
        "unavailable".to_string()
    };

    vec![
        ("Server URL", ctx.server_url().to_string()),
        (
            "Selected model",
            ctx.settings
                .selected_model
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ),
        (
            "Default model",
            ctx.config
                .chat
                .default_model
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Storage", storage),
        ("Namespace", ctx.gateway.namespace().to_string()),
    ]
}

fn set_server_url(ctx: &mut AppContext, url: &str) -> Result<()> {
    ctx.settings.save_url(&ctx.gateway, url)?;
    if !ctx.gateway.is_available() {
        println!(
            "{}",
            "Storage is unavailable; the URL applies to this run only.".yellow()
        );
    }
    println!("{} {}", "Server URL set to".green(), ctx.server_url().cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{PersistenceGateway, SessionSettings};

    fn context() -> AppContext {
        AppContext::with_gateway(
            Config::default(),
            PersistenceGateway::in_memory("neo2_"),
            None,
        )
    }

    #[test]
    fn test_set_url_persists() {
        let mut ctx = context();
        handle_settings(
            &mut ctx,
            SettingsCommand::SetUrl {
                url: "http://gpu-box:11434/".to_string(),
            },
        )
        .unwrap();

        assert_eq!(ctx.server_url(), "http://gpu-box:11434");
        let reloaded = SessionSettings::load(&ctx.gateway, "http://localhost:11434");
        assert_eq!(reloaded.server_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_set_url_rejects_non_http() {
        let mut ctx = context();
        let result = handle_settings(
            &mut ctx,
            SettingsCommand::SetUrl {
                url: "ftp://host".to_string(),
            },
        );
        assert!(result.is_err());
        assert_eq!(ctx.server_url(), "http://localhost:11434");
    }

    #[test]
    fn test_settings_rows() {
        let ctx = AppContext::with_gateway(
            Config::default(),
            PersistenceGateway::unavailable("neo2_"),
            None,
        );
        let rows = settings_rows(&ctx);
        assert_eq!(rows[0], ("Server URL", "http://localhost:11434".to_string()));
        assert_eq!(rows[1].1, "-");
        assert_eq!(rows[3], ("Storage", "unavailable".to_string()));
        assert_eq!(rows[4].1, "neo2_");
    }
}
