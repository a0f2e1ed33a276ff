use super::config::{default_config_path, RostergateConfig};
use super::token::{determine_token_source, read_token};
use rostergate::attachments::AttachmentSink;
use rostergate::logging;
use rostergate::roster::RosterStore;
use rostergate::telegram::{supervise, BackoffPolicy, GatekeeperBot, SessionRegistry, TelegramClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Settings checked before anything touches the network or the log file
struct RunSettings {
    token: String,
    policy: BackoffPolicy,
}

/// Run the bot service
///
/// ## Configuration Loading
///
/// Configuration is read from `--config` if provided, otherwise from
/// `~/.config/rostergate/config.toml`. If the file doesn't exist, a
/// commented default is written and the command stops so the operator can
/// fill in the group id.
///
/// ## Token Loading
///
/// 1. `--token-file` flag if provided
/// 2. `ROSTERGATE_TOKEN` environment variable
/// 3. `token` key in the `[telegram]` section
///
/// The roster and the session registry are created once and shared by every
/// transport session the supervisor builds.
pub async fn execute(
    config_path: Option<String>,
    token_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    println!("🚀 Starting rostergate...");
    println!("Config: {}", config_path.display());

    let config = if config_path.exists() {
        RostergateConfig::load(&config_path)?
    } else {
        println!();
        println!("📝 No config file found. Creating default configuration...");
        RostergateConfig::create_default(&config_path)?;
        println!("   Created: {}", config_path.display());
        RostergateConfig::load(&config_path)?
    };

    let settings = validate(&config, token_file)?;

    let _guard = logging::init(&config.logging.level, &config.logging.file)?;
    info!("Logging to {}", config.logging.file.display());

    let roster = open_roster(&config)?;

    let attachments = AttachmentSink::new(&config.storage.images_dir);
    attachments.ensure_dir().await?;

    serve(config, settings, roster, attachments).await;
    Ok(())
}

fn validate(
    config: &RostergateConfig,
    token_file: Option<String>,
) -> Result<RunSettings, Box<dyn std::error::Error>> {
    if config.telegram.group_id == 0 {
        return Err("telegram.group_id is not set. Edit the config file and set the group chat id".into());
    }

    let policy = config.supervisor.backoff_policy()?;
    let source = determine_token_source(token_file, config.telegram.token.as_deref());
    let token = read_token(source)?;

    Ok(RunSettings { token, policy })
}

fn open_roster(config: &RostergateConfig) -> Result<Arc<RosterStore>, Box<dyn std::error::Error>> {
    let roster = RosterStore::open(&config.storage.roster_path);
    if roster.is_empty() {
        return Err(format!(
            "Roster '{}' has no entries. Nobody could ever be verified",
            config.storage.roster_path.display()
        )
        .into());
    }
    Ok(Arc::new(roster))
}

async fn serve(
    config: RostergateConfig,
    settings: RunSettings,
    roster: Arc<RosterStore>,
    attachments: AttachmentSink,
) {
    let sessions = Arc::new(SessionRegistry::new());
    let group = config.group();
    let token: Arc<str> = Arc::from(settings.token);
    let api_url: Arc<str> = Arc::from(config.telegram.api_url.as_str());

    info!(
        "Serving group {} with {} roster entries ({} already joined)",
        group,
        roster.len(),
        roster.joined_count()
    );

    let supervised = supervise(settings.policy, || {
        let token = token.clone();
        let api_url = api_url.clone();
        let roster = roster.clone();
        let attachments = attachments.clone();
        let sessions = sessions.clone();
        async move {
            let client = TelegramClient::connect(&token, &api_url).await?;
            let bot = GatekeeperBot::new(client, roster, attachments, sessions, group);
            bot.run().await
        }
    });

    tokio::select! {
        restarts = supervised => {
            info!("Supervisor stopped after {} restarts", restarts);
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }
}
