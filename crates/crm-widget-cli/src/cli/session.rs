//! Visitor session commands: show, clear.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Print the stored visitor session.
///
/// # Examples
///
/// ```bash
/// crmw session show
/// crmw session show --json
/// ```
pub async fn show_session(state: &AppState, json: bool) -> Result<()> {
    let session = state.session_store().load().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    let Some(session) = session else {
        println!();
        println!(
            "  {} No stored session. Start one with: {}",
            style("i").blue().bold(),
            style("crmw chat").yellow()
        );
        println!();
        return Ok(());
    };

    println!();
    println!("  {}  {}", style("Visitor:").bold(), session.visitor_id);
    println!(
        "  {}     {}",
        style("Chat:").bold(),
        session
            .chat_id
            .as_ref()
            .map_or_else(|| style("(none yet)").dim().to_string(), ToString::to_string)
    );
    println!(
        "  {}    {}",
        style("Token:").bold(),
        if session.token.is_some() {
            style("present").green()
        } else {
            style("missing").yellow()
        }
    );
    println!();
    Ok(())
}

/// Forget the stored visitor session.
pub async fn clear_session(state: &AppState, json: bool) -> Result<()> {
    let store = state.session_store();
    let existed = store.load().await.is_some();
    store.clear().await;

    if json {
        println!("{}", serde_json::json!({ "cleared": existed }));
    } else if existed {
        println!(
            "\n  {} Visitor session cleared. The next chat starts a new conversation.\n",
            style("✓").green().bold()
        );
    } else {
        println!("\n  {} No stored session.\n", style("i").blue().bold());
    }
    Ok(())
}
