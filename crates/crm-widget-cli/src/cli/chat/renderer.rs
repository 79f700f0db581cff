//! Turns widget view snapshots into transcript lines.
//!
//! The coordinator publishes whole [`WidgetView`] snapshots; a terminal can
//! only append. `TranscriptPrinter` remembers what it already printed and
//! yields only the new events for each snapshot.

use std::collections::HashSet;

use console::style;

use crm_widget_core::widget::WidgetView;
use crm_widget_types::message::{Message, Sender};

/// Something worth printing since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Message { sender: Sender, author: String, content: String, time: String },
    Notice(String),
    Typing(String),
    Unread(String),
}

/// Tracks printed state across view snapshots.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: HashSet<String>,
    /// Set once the post-bootstrap history has been printed.
    history_printed: bool,
    last_notice: Option<u64>,
    was_typing: bool,
    last_unread: u32,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for `view` that were not printed yet.
    ///
    /// History printed right after bootstrap includes visitor messages;
    /// afterwards visitor messages are skipped since the user typed them.
    pub fn update(&mut self, view: &WidgetView) -> Vec<TranscriptEvent> {
        let mut events = Vec::new();

        if view.loading {
            // a reset session bootstraps again and reprints its history
            self.history_printed = false;
            self.printed.clear();
        } else {
            let live = self.history_printed;
            for message in &view.messages {
                if message.is_optimistic() || !self.printed.insert(message.id.clone()) {
                    continue;
                }
                if live && message.sender == Sender::Visitor {
                    continue;
                }
                events.push(message_event(message, &view.agent_name));
            }
            self.history_printed = true;
        }

        let notice_id = view.notice.as_ref().map(|notice| notice.id);
        if notice_id.is_some() && notice_id != self.last_notice {
            if let Some(text) = view.notice_text() {
                events.push(TranscriptEvent::Notice(text.to_string()));
            }
        }
        self.last_notice = notice_id.or(self.last_notice);

        if view.agent_typing && !self.was_typing {
            events.push(TranscriptEvent::Typing(view.agent_name.clone()));
        }
        self.was_typing = view.agent_typing;

        if !view.is_open && view.unread > self.last_unread {
            if let Some(badge) = view.unread_badge() {
                events.push(TranscriptEvent::Unread(badge));
            }
        }
        self.last_unread = view.unread;

        events
    }
}

fn message_event(message: &Message, agent_name: &str) -> TranscriptEvent {
    let author = match message.sender {
        Sender::Visitor => "You".to_string(),
        Sender::Agent => agent_name.to_string(),
    };
    TranscriptEvent::Message {
        sender: message.sender,
        author,
        content: message.content.clone(),
        time: message.created_at.format("%H:%M").to_string(),
    }
}

/// Styled terminal line for an event.
pub fn format_event(event: &TranscriptEvent) -> String {
    match event {
        TranscriptEvent::Message { sender, author, content, time } => {
            let label = match sender {
                Sender::Visitor => style(format!("{author} >")).green().bold(),
                Sender::Agent => style(format!("{author} >")).cyan().bold(),
            };
            format!("  {} {label} {content}", style(time).dim())
        }
        TranscriptEvent::Notice(text) => format!("  {} {text}", style("!").red().bold()),
        TranscriptEvent::Typing(name) => {
            format!("  {}", style(format!("{name} is typing...")).dim().italic())
        }
        TranscriptEvent::Unread(badge) => format!(
            "  {} {} unread",
            style("●").yellow().bold(),
            style(badge).yellow()
        ),
    }
}
