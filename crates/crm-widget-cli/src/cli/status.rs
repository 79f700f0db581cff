//! Effective configuration and session overview.

use anyhow::Result;
use console::style;

use crm_widget_infra::config::CONFIG_FILE_NAME;

use crate::state::AppState;

/// Display the effective widget configuration.
///
/// The public key is shown only as present/missing.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;
    let session = state.session_store().load().await;
    let valid = config.validate();

    if json {
        let status = serde_json::json!({
            "data_dir": state.data_dir.display().to_string(),
            "workspace_id": config.workspace_id,
            "public_key_set": !config.public_key.is_empty(),
            "api_url": config.api_base(),
            "ws_url": config.ws_base(),
            "dispatch": config.dispatch.to_string(),
            "resume_chat": config.resume_chat,
            "valid": valid.is_ok(),
            "session": session,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let check = |ok: bool| {
        if ok {
            style("✓").green().to_string()
        } else {
            style("✗").red().to_string()
        }
    };

    println!();
    println!("  {}", style("CRM widget").cyan().bold());
    println!();
    println!(
        "  {}    {}",
        style("Config:").bold(),
        style(state.data_dir.join(CONFIG_FILE_NAME).display()).dim()
    );
    println!("  {} {}", style("Workspace:").bold(), config.workspace_id);
    println!("  {}       {}", style("API:").bold(), config.api_base());
    println!("  {}  {}", style("Realtime:").bold(), config.ws_base());
    println!("  {}  {}", style("Dispatch:").bold(), config.dispatch);
    println!();
    println!("  {} workspace id set", check(!config.workspace_id.is_empty()));
    println!("  {} public key set", check(!config.public_key.is_empty()));
    println!(
        "  {} stored session{}",
        check(session.is_some()),
        session
            .as_ref()
            .and_then(|s| s.chat_id.as_ref())
            .map(|chat| format!(" (chat {chat})"))
            .unwrap_or_default()
    );
    if let Err(err) = valid {
        println!();
        println!("  {} {err}", style("!").yellow().bold());
    }
    println!();
    Ok(())
}
