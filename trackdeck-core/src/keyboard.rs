//! Global keyboard shortcuts.

/// Player command bound to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    TogglePlay,
    Previous,
    Next,
}

/// Map a `KeyboardEvent.key` value to a command.
///
/// Returns `None` while a text input has focus so typing in the search box
/// never controls playback.
#[must_use]
pub fn command_for_key(key: &str, text_input_focused: bool) -> Option<KeyCommand> {
    if text_input_focused {
        return None;
    }
    match key {
        " " | "Space" | "Spacebar" => Some(KeyCommand::TogglePlay),
        "ArrowUp" => Some(KeyCommand::Previous),
        "ArrowDown" => Some(KeyCommand::Next),
        _ => None,
    }
}
