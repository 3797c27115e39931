//! Chat command parsing.

/// A recognized chat command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    /// Publish the list of available sounds.
    ListSounds,
    /// Queue the named sound.
    Play(String),
}

const PREFIX: char = '!';
const LIST_SOUNDS: &str = "sounds";

impl ChatCommand {
    /// Parse a chat message. Anything not starting with `!` is not a command.
    ///
    /// `!sounds` matches as a prefix, so `!soundsplease` also lists. Sound
    /// names are taken verbatim and are case-sensitive.
    pub fn parse(message: &str) -> Option<Self> {
        let rest = message.strip_prefix(PREFIX)?;
        if rest.starts_with(LIST_SOUNDS) {
            Some(Self::ListSounds)
        } else {
            Some(Self::Play(rest.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_messages_are_not_commands() {
        assert_eq!(ChatCommand::parse("hello there"), None);
        assert_eq!(ChatCommand::parse(""), None);
        assert_eq!(ChatCommand::parse(" !airhorn"), None);
    }

    #[test]
    fn bang_name_plays_verbatim() {
        assert_eq!(
            ChatCommand::parse("!AirHorn"),
            Some(ChatCommand::Play("AirHorn".into()))
        );
        assert_eq!(
            ChatCommand::parse("!rim shot"),
            Some(ChatCommand::Play("rim shot".into()))
        );
    }

    #[test]
    fn sounds_lists_by_prefix() {
        assert_eq!(ChatCommand::parse("!sounds"), Some(ChatCommand::ListSounds));
        assert_eq!(ChatCommand::parse("!soundsplz"), Some(ChatCommand::ListSounds));
        assert_eq!(
            ChatCommand::parse("!Sounds"),
            Some(ChatCommand::Play("Sounds".into()))
        );
    }

    #[test]
    fn bare_bang_is_an_empty_play() {
        assert_eq!(ChatCommand::parse("!"), Some(ChatCommand::Play(String::new())));
    }
}
