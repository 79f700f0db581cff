//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and map onto widget intents: open/close the
//! panel, reset the visitor session, leave.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Open the panel; clears the unread counter.
    Open,
    /// Close the panel; incoming messages count as unread.
    Close,
    /// Open when closed, close when open.
    Toggle,
    /// Forget the visitor and start a new conversation.
    Reset,
    /// Show visitor, chat and realtime connection state.
    Status,
    /// Clear the terminal screen.
    Clear,
    /// Exit the chat.
    Exit,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/open" => Some(ChatCommand::Open),
        "/close" | "/minimize" => Some(ChatCommand::Close),
        "/toggle" => Some(ChatCommand::Toggle),
        "/reset" | "/new" => Some(ChatCommand::Reset),
        "/status" => Some(ChatCommand::Status),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Help text listing all available commands, one line each.
pub fn help_lines() -> Vec<String> {
    let rows = [
        ("/help", "Show this help message"),
        ("/open", "Open the panel (clears unread)"),
        ("/close", "Close the panel (count unread)"),
        ("/toggle", "Open or close the panel"),
        ("/reset", "Forget this visitor, start over"),
        ("/status", "Show session and connection state"),
        ("/clear", "Clear the screen"),
        ("/exit", "Leave the chat"),
    ];

    let mut lines = vec![String::new(), format!("  {}", style("Available commands:").bold())];
    lines.extend(
        rows.iter()
            .map(|(cmd, help)| format!("  {} {help}", style(format!("{cmd:<8}")).cyan())),
    );
    lines.push(String::new());
    lines
}
