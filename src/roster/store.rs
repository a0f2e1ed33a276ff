//! Roster persistence and the single-use join invariant.
//!
//! All reads and writes of the roster go through one mutex. Verification is
//! split into `claim` (find + check + mark pending), an issuance step that
//! runs without the lock, and `RosterClaim::commit` (re-check + mark joined +
//! persist). A pending entry cannot be claimed a second time, so two
//! concurrent attempts for the same name yield at most one credential.

use super::entry::{NameKey, RosterEntry};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Column names of the roster file, in file order.
pub const ROSTER_HEADERS: [&str; 3] = ["NOM", "PRENOM", "joined"];

/// Result of reading a roster file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
    /// Rows that could not be parsed and were left out.
    pub skipped_rows: usize,
}

impl Roster {
    /// Normalized names that appear more than once. Lookups resolve these
    /// to the first matching row.
    pub fn duplicates(&self) -> Vec<NameKey> {
        let mut seen = HashMap::new();
        let mut duplicates = Vec::new();
        for entry in &self.entries {
            let count = seen.entry(entry.key()).or_insert(0usize);
            *count += 1;
            if *count == 2 {
                duplicates.push(entry.key());
            }
        }
        duplicates
    }

    pub fn joined_count(&self) -> usize {
        self.entries.iter().filter(|e| e.joined).count()
    }
}

/// Roster errors
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Roster file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed roster file: {0}")]
    Malformed(String),

    #[error("Roster I/O failure: {0}")]
    Io(String),

    #[error("Roster entry {0} has already joined")]
    AlreadyJoined(usize),

    #[error("No roster entry at index {0}")]
    UnknownEntry(usize),
}

/// Outcome of trying to reserve a roster entry for credential issuance.
#[derive(Debug)]
pub enum ClaimOutcome<'a> {
    /// Entry reserved; issue the credential, then `commit`.
    Claimed(RosterClaim<'a>),
    NotFound,
    AlreadyJoined(RosterEntry),
    /// Another session holds a claim on this entry right now.
    InProgress(RosterEntry),
}

#[derive(Debug, Default)]
struct RosterState {
    entries: Vec<RosterEntry>,
    pending: HashSet<usize>,
}

impl RosterState {
    fn find(&self, key: &NameKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == *key)
    }

    fn mark_joined(&mut self, index: usize) -> Result<(), RosterError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(RosterError::UnknownEntry(index))?;

        if entry.joined {
            return Err(RosterError::AlreadyJoined(index));
        }

        entry.joined = true;
        Ok(())
    }
}

/// Owner of the in-memory roster and its backing CSV file.
#[derive(Debug)]
pub struct RosterStore {
    path: PathBuf,
    state: Mutex<RosterState>,
}

impl RosterStore {
    /// Create a store over already-loaded entries.
    pub fn new(path: impl Into<PathBuf>, entries: Vec<RosterEntry>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(RosterState {
                entries,
                pending: HashSet::new(),
            }),
        }
    }

    /// Open the roster at `path`.
    ///
    /// Never fails: a missing or unreadable file is logged and yields an
    /// empty store. Callers decide whether an empty roster is usable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(roster) => {
                for key in roster.duplicates() {
                    warn!(
                        "Duplicate roster name '{}': only the first matching row will be used",
                        key
                    );
                }
                info!(
                    "Loaded {} roster entries ({} already joined) from {}",
                    roster.entries.len(),
                    roster.joined_count(),
                    path.display()
                );
                roster.entries
            }
            Err(e) => {
                error!("Failed to load roster: {}", e);
                Vec::new()
            }
        };
        Self::new(path, entries)
    }

    /// Parse a roster file.
    ///
    /// Rows that fail to parse are skipped with a warning. A missing
    /// `joined` column or empty cell reads as not joined.
    pub fn load(path: &Path) -> Result<Roster, RosterError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RosterError::NotFound(path.to_path_buf()),
            _ => RosterError::Io(format!("Failed to open '{}': {}", path.display(), e)),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| RosterError::Malformed(format!("Unreadable header row: {}", e)))?;
        for required in &ROSTER_HEADERS[..2] {
            if !headers.iter().any(|h| h == *required) {
                return Err(RosterError::Malformed(format!(
                    "Missing '{}' column in {}",
                    required,
                    path.display()
                )));
            }
        }

        let mut roster = Roster::default();
        for (row, record) in reader.deserialize::<RosterEntry>().enumerate() {
            match record {
                Ok(entry) => roster.entries.push(entry),
                Err(e) => {
                    // +2: one for the header, one for 1-based numbering
                    warn!("Skipping malformed roster row {}: {}", row + 2, e);
                    roster.skipped_rows += 1;
                }
            }
        }

        Ok(roster)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, RosterState> {
        // Entries are only ever mutated by whole-field assignment, so a
        // poisoned guard still holds a consistent roster.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index of the first entry matching the normalized name pair.
    pub fn find_by_name(&self, first: &str, last: &str) -> Option<usize> {
        self.lock().find(&NameKey::new(first, last))
    }

    /// Snapshot of the entry at `index`.
    pub fn get(&self, index: usize) -> Option<RosterEntry> {
        self.lock().entries.get(index).cloned()
    }

    /// Snapshot of all entries, in file order.
    pub fn entries(&self) -> Vec<RosterEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn joined_count(&self) -> usize {
        self.lock().entries.iter().filter(|e| e.joined).count()
    }

    /// Mark the entry at `index` as joined.
    ///
    /// Re-validates under the lock: fails with `AlreadyJoined` if the entry
    /// was joined already. Does not persist.
    pub fn mark_joined(&self, index: usize) -> Result<(), RosterError> {
        self.lock().mark_joined(index)
    }

    /// Write the full roster to disk.
    ///
    /// The in-memory roster stays authoritative if this fails.
    pub fn persist(&self) -> Result<(), RosterError> {
        let state = self.lock();
        write_roster(&self.path, &state.entries)
    }

    /// Reserve the entry matching `key` for credential issuance.
    pub fn claim(&self, key: &NameKey) -> ClaimOutcome<'_> {
        let mut state = self.lock();

        let Some(index) = state.find(key) else {
            return ClaimOutcome::NotFound;
        };
        let entry = state.entries[index].clone();

        if entry.joined {
            return ClaimOutcome::AlreadyJoined(entry);
        }
        if !state.pending.insert(index) {
            return ClaimOutcome::InProgress(entry);
        }

        debug!("Claimed roster entry {} for issuance", index);
        ClaimOutcome::Claimed(RosterClaim {
            store: self,
            index,
            entry,
            committed: false,
        })
    }
}

/// A pending reservation of one roster entry.
///
/// Dropping the claim without committing releases the reservation, which
/// is what happens when issuance fails.
#[derive(Debug)]
pub struct RosterClaim<'a> {
    store: &'a RosterStore,
    index: usize,
    entry: RosterEntry,
    committed: bool,
}

impl RosterClaim<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn entry(&self) -> &RosterEntry {
        &self.entry
    }

    /// Mark the claimed entry joined and persist the roster.
    ///
    /// A persist failure is logged and does not undo the join.
    pub fn commit(mut self) -> Result<RosterEntry, RosterError> {
        let mut state = self.store.lock();
        state.pending.remove(&self.index);
        self.committed = true;

        state.mark_joined(self.index)?;
        if let Err(e) = write_roster(&self.store.path, &state.entries) {
            error!(
                "Failed to save roster after marking entry {} joined: {}",
                self.index, e
            );
        }

        Ok(state.entries[self.index].clone())
    }
}

impl Drop for RosterClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.store.lock().pending.remove(&self.index);
            debug!("Released claim on roster entry {}", self.index);
        }
    }
}

/// Write entries to a sibling temp file, then rename it over `path`.
fn write_roster(path: &Path, entries: &[RosterEntry]) -> Result<(), RosterError> {
    let tmp_path = path.with_extension("csv.tmp");
    let io_err = |e: &dyn std::fmt::Display| {
        RosterError::Io(format!("Failed to write '{}': {}", path.display(), e))
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp_path)
        .map_err(|e| io_err(&e))?;
    writer.write_record(ROSTER_HEADERS).map_err(|e| io_err(&e))?;
    for entry in entries {
        writer.serialize(entry).map_err(|e| io_err(&e))?;
    }
    writer.flush().map_err(|e| io_err(&e))?;
    drop(writer);

    fs::rename(&tmp_path, path).map_err(|e| io_err(&e))?;
    debug!("Saved {} roster entries to {}", entries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("students.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    fn sample_store() -> RosterStore {
        RosterStore::new(
            "unused.csv",
            vec![
                RosterEntry::new("John", "Doe"),
                RosterEntry::new("Alice", "Smith"),
            ],
        )
    }

    #[test]
    fn test_find_by_name_ignores_case_and_whitespace() {
        let store = sample_store();

        assert_eq!(store.find_by_name("john", "doe"), Some(0));
        assert_eq!(store.find_by_name(" John ", "  Doe "), Some(0));
        assert_eq!(store.find_by_name("JOHN", "DOE"), Some(0));
        assert_eq!(store.find_by_name("alice", "smith"), Some(1));
        assert_eq!(store.find_by_name("bob", "smith"), None);
    }

    #[test]
    fn test_find_by_name_returns_first_duplicate() {
        let store = RosterStore::new(
            "unused.csv",
            vec![
                RosterEntry::new("Sam", "Lee"),
                RosterEntry::new("SAM", " lee "),
            ],
        );
        assert_eq!(store.find_by_name("sam", "lee"), Some(0));
    }

    #[test]
    fn test_mark_joined_twice_fails() {
        let store = sample_store();

        store.mark_joined(1).unwrap();
        let err = store.mark_joined(1).unwrap_err();

        assert!(matches!(err, RosterError::AlreadyJoined(1)));
        assert!(store.get(1).unwrap().joined);
        assert!(!store.get(0).unwrap().joined);
    }

    #[test]
    fn test_mark_joined_unknown_index() {
        let store = sample_store();
        assert!(matches!(
            store.mark_joined(9),
            Err(RosterError::UnknownEntry(9))
        ));
    }

    #[test]
    fn test_load_parses_rows_and_joined_flag() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "NOM,PRENOM,joined\nDoe,John,false\nSmith,Alice,True\nLee,Sam,\n",
        );

        let roster = RosterStore::load(&path).unwrap();

        assert_eq!(roster.entries.len(), 3);
        assert_eq!(roster.entries[0].first_name, "John");
        assert_eq!(roster.entries[0].last_name, "Doe");
        assert!(!roster.entries[0].joined);
        assert!(roster.entries[1].joined);
        assert!(!roster.entries[2].joined);
        assert_eq!(roster.skipped_rows, 0);
    }

    #[test]
    fn test_load_without_joined_column_defaults_false() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "NOM,PRENOM\nDoe,John\n");

        let roster = RosterStore::load(&path).unwrap();

        assert_eq!(roster.entries.len(), 1);
        assert!(!roster.entries[0].joined);
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "NOM,PRENOM,joined\nDoe,John,false\nOrphan\nSmith,Alice,false\n");

        let roster = RosterStore::load(&path).unwrap();

        assert_eq!(roster.entries.len(), 2);
        assert_eq!(roster.skipped_rows, 1);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = RosterStore::load(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(RosterError::NotFound(_))));
    }

    #[test]
    fn test_load_missing_name_column_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "NAME,joined\nJohn Doe,false\n");
        assert!(matches!(
            RosterStore::load(&path),
            Err(RosterError::Malformed(_))
        ));
    }

    #[test]
    fn test_open_missing_file_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = RosterStore::open(dir.path().join("missing.csv"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_persist_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("students.csv");
        let store = RosterStore::new(
            &path,
            vec![
                RosterEntry::new("John", "Doe"),
                RosterEntry::new("Alice", "Smith"),
            ],
        );
        store.mark_joined(0).unwrap();

        store.persist().unwrap();
        let reloaded = RosterStore::load(&path).unwrap();

        assert_eq!(reloaded.entries, store.entries());
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("NOM,PRENOM,joined\n"));
        assert!(contents.contains("Doe,John,true"));
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("students.csv");
        let store = RosterStore::new(&path, vec![RosterEntry::new("John", "Doe")]);

        store.mark_joined(0).unwrap();

        assert!(matches!(store.persist(), Err(RosterError::Io(_))));
        assert!(store.get(0).unwrap().joined);
    }

    #[test]
    fn test_claim_commit_marks_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("students.csv");
        let store = RosterStore::new(&path, vec![RosterEntry::new("Alice", "Smith")]);

        let key = NameKey::new("alice", "smith");
        let claim = match store.claim(&key) {
            ClaimOutcome::Claimed(claim) => claim,
            other => panic!("Expected claim, got {:?}", other),
        };
        let entry = claim.commit().unwrap();

        assert!(entry.joined);
        assert!(RosterStore::load(&path).unwrap().entries[0].joined);
        assert!(matches!(store.claim(&key), ClaimOutcome::AlreadyJoined(_)));
    }

    #[test]
    fn test_claim_is_exclusive_until_released() {
        let store = sample_store();
        let key = NameKey::new("john", "doe");

        let first = store.claim(&key);
        assert!(matches!(first, ClaimOutcome::Claimed(_)));
        assert!(matches!(store.claim(&key), ClaimOutcome::InProgress(_)));

        // Dropping without commit (failed issuance) frees the entry again
        drop(first);
        assert!(matches!(store.claim(&key), ClaimOutcome::Claimed(_)));
        assert!(!store.get(0).unwrap().joined);
    }

    #[test]
    fn test_claim_unknown_name() {
        let store = sample_store();
        assert!(matches!(
            store.claim(&NameKey::new("nobody", "here")),
            ClaimOutcome::NotFound
        ));
    }

    #[test]
    fn test_duplicates_reported_once() {
        let roster = Roster {
            entries: vec![
                RosterEntry::new("Sam", "Lee"),
                RosterEntry::new("sam", "LEE"),
                RosterEntry::new("Sam", "Lee"),
                RosterEntry::new("Ana", "Lee"),
            ],
            skipped_rows: 0,
        };
        assert_eq!(roster.duplicates(), vec![NameKey::new("sam", "lee")]);
    }
}
