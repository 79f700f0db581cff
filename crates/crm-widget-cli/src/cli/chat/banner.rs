//! Welcome banner display for chat sessions.

use console::style;

use crm_widget_types::config::WidgetConfig;

/// Print the banner once the widget has bootstrapped.
pub fn print_welcome_banner(agent_name: &str, config: &WidgetConfig, chat: Option<&str>) {
    println!();
    println!("  {} {}", style("●").green(), style(agent_name).cyan().bold());
    println!("  {}", style("Live support").dim());
    println!();
    println!(
        "  {}  {}",
        style("Workspace:").bold(),
        style(&config.workspace_id).dim()
    );
    println!(
        "  {}       {}",
        style("Chat:").bold(),
        style(chat.unwrap_or("new conversation")).dim()
    );
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
