use std::fs;
use std::path::Path;

/// Environment variable holding the bot token
pub const TOKEN_ENV_VAR: &str = "ROSTERGATE_TOKEN";

/// Places a bot token can come from, checked in order
#[derive(Debug, PartialEq, Eq)]
pub enum TokenSource {
    /// From --token-file /run/secrets/bot_token (container-native)
    File(String),
    /// From ROSTERGATE_TOKEN env var
    EnvVar(String),
    /// From the [telegram] token key of the config file
    Config(String),
    /// Nothing configured
    Missing,
}

/// Determine token source from CLI arguments, environment and config
///
/// 1. If token_file is Some, use File
/// 2. If ROSTERGATE_TOKEN is set and non-empty, use EnvVar
/// 3. If the config carries a token, use Config
/// 4. Otherwise Missing
pub fn determine_token_source(token_file: Option<String>, config_token: Option<&str>) -> TokenSource {
    if let Some(file) = token_file {
        return TokenSource::File(file);
    }

    match std::env::var(TOKEN_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => return TokenSource::EnvVar(value),
        _ => {}
    }

    match config_token {
        Some(token) => TokenSource::Config(token.to_string()),
        None => TokenSource::Missing,
    }
}

/// Read the bot token from the chosen source
pub fn read_token(source: TokenSource) -> Result<String, Box<dyn std::error::Error>> {
    let token = match source {
        TokenSource::File(path) => {
            if !Path::new(&path).exists() {
                return Err(format!("Token file not found: {}", path).into());
            }

            fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read token file: {}", e))?
                .trim()
                .to_string()
        }
        TokenSource::EnvVar(value) => value.trim().to_string(),
        TokenSource::Config(value) => {
            eprintln!("⚠️  WARNING: Bot token is stored in the config file");
            eprintln!("   Consider using --token-file or {} instead", TOKEN_ENV_VAR);
            eprintln!();
            value.trim().to_string()
        }
        TokenSource::Missing => {
            return Err(format!(
                "No bot token configured. Use --token-file, set {}, or add token to [telegram]",
                TOKEN_ENV_VAR
            )
            .into());
        }
    };

    if token.is_empty() {
        return Err("Bot token is empty".into());
    }

    Ok(token)
}
