//! Main chat loop orchestration.
//!
//! Mounts the widget, waits for bootstrap behind a spinner, then runs two
//! tasks side by side: one prints transcript events as view snapshots
//! arrive, the other reads input lines and turns them into widget intents.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use rustyline_async::SharedWriter;
use tokio::sync::watch;
use tracing::{debug, info};

use crm_widget_core::widget::{WidgetHost, WidgetView};
use crm_widget_infra::realtime::WsConnector;

use crate::state::{AppState, ConcreteCoordinator};

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::{TranscriptPrinter, format_event};

/// Write one line through the readline-aware writer. Terminal write
/// failures are not worth aborting the chat for.
fn emit(out: &mut SharedWriter, line: impl std::fmt::Display) {
    let _ = writeln!(out, "{line}");
}

/// Print transcript events until the coordinator goes away.
async fn print_transcript(mut view: watch::Receiver<WidgetView>, mut out: SharedWriter) {
    let mut printer = TranscriptPrinter::new();
    loop {
        let events = printer.update(&view.borrow_and_update());
        for event in &events {
            emit(&mut out, format_event(event));
        }
        if view.changed().await.is_err() {
            break;
        }
    }
}

/// Run the interactive chat.
pub async fn run_chat_loop(state: &AppState) -> anyhow::Result<()> {
    state.config.validate().context(
        "widget is not configured: set workspace_id and public_key in widget.toml \
         or pass --workspace and --public-key",
    )?;

    let host = WidgetHost::new();
    let widget = host
        .mount(
            state.config.clone(),
            state.api_client()?,
            state.storage(),
            WsConnector::new(),
        )?
        .context("widget already mounted")?;

    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(indicatif::ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("connecting to support...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    widget.subscribe().wait_for(|view| !view.loading).await?;
    spinner.finish_and_clear();

    let chat = widget
        .session()
        .and_then(|session| session.chat_id)
        .map(|chat| chat.to_string());
    print_welcome_banner(&widget.view().agent_name, widget.config(), chat.as_deref());
    widget.open();

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, mut out) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
    let printer = tokio::spawn(print_transcript(widget.subscribe(), out.clone()));

    loop {
        let text = match input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                emit(&mut out, style("  Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Line(text) if text.is_empty() => continue,
            InputEvent::Line(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => {
                    for line in commands::help_lines() {
                        emit(&mut out, line);
                    }
                }
                ChatCommand::Open => widget.open(),
                ChatCommand::Close => {
                    widget.close();
                    emit(
                        &mut out,
                        style("  Panel closed. Incoming messages count as unread; /open to reopen.").dim(),
                    );
                }
                ChatCommand::Toggle => widget.toggle(),
                ChatCommand::Reset => {
                    widget.clear_session().await;
                    emit(&mut out, style("  Starting a new conversation...").dim());
                    if let Err(err) = widget.start().await {
                        debug!(error = %err, "restart after reset failed");
                    }
                }
                ChatCommand::Status => print_status(&widget, &mut out),
                ChatCommand::Clear => input.clear(),
                ChatCommand::Exit => break,
                ChatCommand::Unknown(name) => emit(
                    &mut out,
                    format!(
                        "  {} Unknown command: {}. Type /help for available commands.",
                        style("?").yellow().bold(),
                        style(name).dim()
                    ),
                ),
            }
            continue;
        }

        if widget.session().is_none() {
            emit(
                &mut out,
                format!(
                    "  {} Not connected to support yet. Try /reset.",
                    style("!").yellow().bold()
                ),
            );
            continue;
        }

        widget.set_draft(text.clone());
        let sender = Arc::clone(&widget);
        tokio::spawn(async move {
            // failures surface as view notices
            if let Err(err) = sender.send(&text).await {
                debug!(error = %err, "visitor message not sent");
            }
        });
    }

    widget.shutdown();
    printer.abort();
    info!("chat session ended");
    emit(&mut out, style("\n  Session ended.").dim());
    Ok(())
}

fn print_status(widget: &ConcreteCoordinator, out: &mut SharedWriter) {
    let view = widget.view();
    let session = widget.session();
    let visitor = session
        .as_ref()
        .map_or("(none)".to_string(), |s| s.visitor_id.clone());
    let chat = session
        .as_ref()
        .and_then(|s| s.chat_id.as_ref())
        .map_or("(not created yet)".to_string(), ToString::to_string);
    let channel = widget
        .channel_state()
        .map_or("not attached".to_string(), |state| format!("{state:?}").to_lowercase());

    emit(out, "");
    emit(out, format!("  {}  {visitor}", style("Visitor:").bold()));
    emit(out, format!("  {}     {chat}", style("Chat:").bold()));
    emit(out, format!("  {}  {channel}", style("Realtime:").bold()));
    emit(
        out,
        format!(
            "  {}     {}",
            style("Panel:").bold(),
            if view.is_open { "open" } else { "closed" }
        ),
    );
    emit(out, format!("  {}  {}", style("Messages:").bold(), view.messages.len()));
    emit(out, "");
}
