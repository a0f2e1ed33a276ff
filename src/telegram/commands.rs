//! Bot commands
//!
//! Commands: /start, /cancel, /help. Anything else is an unknown command and
//! is handled like any other non-text input for the current state.

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin (or restart) verification
    Start,

    /// Abandon the current verification
    Cancel,

    /// Show help
    Help,

    /// Unknown command
    Unknown(String),
}

impl Command {
    /// Parse a command name (without the leading `/`).
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "start" => Command::Start,
            "cancel" => Command::Cancel,
            "help" => Command::Help,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Get command syntax and description for help text
    ///
    /// Returns (command_syntax, description) tuple.
    /// Only includes user-facing commands (excludes Unknown).
    pub fn help_text(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Command::Start => Some(("/start", "Begin verification (send a photo, then your name)")),
            Command::Cancel => Some(("/cancel", "Cancel the current verification")),
            Command::Help => Some(("/help", "Show this help message")),
            Command::Unknown(_) => None,
        }
    }

    /// Get all available commands for help listing
    pub fn all_commands() -> Vec<(&'static str, &'static str)> {
        [Command::Start, Command::Cancel, Command::Help]
            .iter()
            .filter_map(Command::help_text)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("start"), Command::Start);
        assert_eq!(Command::parse("CANCEL"), Command::Cancel);
        assert_eq!(Command::parse("help"), Command::Help);
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            Command::parse("invite"),
            Command::Unknown("invite".to_string())
        );
    }

    #[test]
    fn test_command_help_text_coverage() {
        let commands = Command::all_commands();
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().any(|(syntax, _)| *syntax == "/start"));
        assert!(Command::Unknown("x".to_string()).help_text().is_none());
    }
}
