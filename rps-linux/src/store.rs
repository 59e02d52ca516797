//! Match history in `<data_dir>/games.txt`, one record per line, append-only.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rps_core::{MatchRecord, MatchStore, StoreError};
use tracing::{info, warn};

pub const GAMES_FILE: &str = "games.txt";

pub struct FileMatchStore {
    path: PathBuf,
}

impl FileMatchStore {
    /// Creates `data_dir` if needed.
    pub fn open(data_dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(GAMES_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MatchStore for FileMatchStore {
    fn append_match_record(&mut self, record: &MatchRecord) -> Result<(), StoreError> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", record)?;
        Ok(())
    }

    fn load_match_history(&self) -> Result<Vec<MatchRecord>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<MatchRecord> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(i, line)| match line.parse() {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("{} line {}: {}", self.path.display(), i + 1, e);
                    None
                }
            })
            .collect();
        info!("{} games in {}", records.len(), self.path.display());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rps_core::{Hand, PlayerState};

    fn record(name: &str) -> MatchRecord {
        MatchRecord {
            local: PlayerState::Lost(Hand::Paper),
            remote: PlayerState::Won(Hand::Scissors),
            played_at: NaiveDate::from_ymd_opt(2024, 2, 29)
                .unwrap()
                .and_hms_opt(23, 59, 1)
                .unwrap(),
            remote_name: name.to_string(),
            remote_contact: "c".to_string(),
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMatchStore::open(&dir.path().join("nested")).unwrap();
        assert!(store.load_match_history().unwrap().is_empty());
    }

    #[test]
    fn append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileMatchStore::open(dir.path()).unwrap();
        store.append_match_record(&record("Bob")).unwrap();
        store.append_match_record(&record("Carol")).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().next(), Some("l+\t2024-02-29T23:59:01\tBob\tc"));
        let loaded = store.load_match_history().unwrap();
        assert_eq!(loaded, vec![record("Bob"), record("Carol")]);
    }

    #[test]
    fn bad_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMatchStore::open(dir.path()).unwrap();
        fs::write(
            store.path(),
            "garbage\n\nl+\t2024-02-29T23:59:01\tBob\tc\n",
        )
        .unwrap();
        assert_eq!(store.load_match_history().unwrap(), vec![record("Bob")]);
    }
}
