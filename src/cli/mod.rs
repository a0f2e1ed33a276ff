use clap::{Parser, Subcommand};

pub mod check_roster;
pub mod config;
pub mod run;
pub mod token;
pub mod version;

#[derive(Parser)]
#[command(name = "rostergate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Admits roster-listed students to a Telegram group", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.config/rostergate/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the bot token (container-native)
        #[arg(long)]
        token_file: Option<String>,
    },

    /// Validate the roster file and print a summary
    CheckRoster {
        /// Path to config file (default: ~/.config/rostergate/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Roster CSV to check instead of the configured one
        #[arg(long)]
        roster: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config, token_file } => run::execute(config, token_file).await,
        Commands::CheckRoster { config, roster } => check_roster::execute(config, roster).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from([
            "rostergate",
            "run",
            "--config",
            "/etc/rostergate/config.toml",
            "--token-file",
            "/run/secrets/bot_token",
        ]);

        match cli.command {
            Commands::Run { config, token_file } => {
                assert_eq!(config, Some("/etc/rostergate/config.toml".to_string()));
                assert_eq!(token_file, Some("/run/secrets/bot_token".to_string()));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["rostergate", "run"]);

        match cli.command {
            Commands::Run { config, token_file } => {
                assert_eq!(config, None);
                assert_eq!(token_file, None);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_check_roster() {
        let cli = Cli::parse_from(["rostergate", "check-roster", "--roster", "students.csv"]);

        match cli.command {
            Commands::CheckRoster { config, roster } => {
                assert_eq!(config, None);
                assert_eq!(roster, Some("students.csv".to_string()));
            }
            _ => panic!("Expected CheckRoster command"),
        }
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["rostergate", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["rostergate", "register"]).is_err());
    }
}
