use super::config::{default_config_path, RostergateConfig, StorageConfig};
use rostergate::roster::{NameKey, RosterStore};
use std::path::{Path, PathBuf};

/// What an operator needs to know about a roster before starting the bot
#[derive(Debug)]
pub struct RosterReport {
    pub path: PathBuf,
    pub entries: usize,
    pub joined: usize,
    pub skipped_rows: usize,
    pub duplicates: Vec<NameKey>,
}

impl RosterReport {
    pub fn pending(&self) -> usize {
        self.entries - self.joined
    }
}

/// Check a roster file without connecting to Telegram
///
/// The roster path is taken from `--roster` if provided, otherwise from the
/// `[storage]` section of the config file. Fails when the file is missing,
/// malformed or has no usable rows.
pub async fn execute(
    config_path: Option<String>,
    roster_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let roster_path = match roster_path {
        Some(path) => PathBuf::from(path),
        None => roster_path_from_config(config_path)?,
    };

    let report = inspect(&roster_path)?;

    println!("📋 Roster: {}", report.path.display());
    println!();
    println!("  Entries: {}", report.entries);
    println!("  Joined: {}", report.joined);
    println!("  Pending: {}", report.pending());

    if report.skipped_rows > 0 {
        println!();
        println!("⚠️  {} malformed rows were skipped", report.skipped_rows);
    }

    if !report.duplicates.is_empty() {
        println!();
        println!("⚠️  Duplicate names (only the first row of each is used):");
        for key in &report.duplicates {
            println!("  • {}", key);
        }
    }

    Ok(())
}

fn roster_path_from_config(config_path: Option<String>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    if config_path.exists() {
        Ok(RostergateConfig::load(&config_path)?.storage.roster_path)
    } else {
        Ok(StorageConfig::default().roster_path)
    }
}

/// Load the roster at `path` and summarize it
pub fn inspect(path: &Path) -> Result<RosterReport, Box<dyn std::error::Error>> {
    let roster = RosterStore::load(path)?;

    if roster.entries.is_empty() {
        return Err(format!("Roster '{}' has no entries", path.display()).into());
    }

    Ok(RosterReport {
        path: path.to_path_buf(),
        entries: roster.entries.len(),
        joined: roster.joined_count(),
        skipped_rows: roster.skipped_rows,
        duplicates: roster.duplicates(),
    })
}
