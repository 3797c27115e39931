//! Line-oriented command console.
//!
//! Each input line is `<caller> <message>`; the message is handled like a
//! chat message from that caller.

use crate::commands::ChatCommand;
use crate::runtime::{Soundboard, TriggerOutcome};

/// Split a console line into caller and message. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((caller, message)) => Some((caller, message.trim_start())),
        None => Some((line, "")),
    }
}

/// Handle one console line. Returns text to show the user, if any.
pub fn handle_line(board: &Soundboard, line: &str) -> Option<String> {
    let (caller, message) = parse_line(line)?;
    match ChatCommand::parse(message)? {
        ChatCommand::Play(name) => {
            if board.trigger(caller, &name) == TriggerOutcome::Accepted {
                tracing::debug!(caller, name = %name, "sound requested");
            }
            None
        }
        ChatCommand::ListSounds => board.admit(caller).then(|| board.sound_list()),
    }
}
