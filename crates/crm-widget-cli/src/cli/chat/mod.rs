//! Interactive terminal chat.
//!
//! Mounts the widget against the configured backend, prints the transcript
//! as view snapshots arrive and forwards typed lines as visitor messages.
//! Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
