//! Peer directory: games advertised by nearby hosts, sorted by game number, with a browse cursor.

use tracing::{info, trace};

use crate::protocol::GameNumber;

/// A game some remote host is advertising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerGameEntry {
    pub game_number: GameNumber,
    pub sender_name: String,
    /// Frequency (Hz) the beacon was heard on.
    pub frequency: u32,
}

/// Result of [`PeerDirectory::insert_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    /// Entry existed; sender name or frequency changed.
    Refreshed,
    Unchanged,
}

/// Sorted, duplicate-free list of advertised games. The selection is an index into the list and
/// is re-pointed on every removal, so it always names a live entry or nothing.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    entries: Vec<PeerGameEntry>,
    selected: Option<usize>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sighting. A repeated sighting refreshes the sender name and frequency in place.
    pub fn insert_or_update(
        &mut self,
        game_number: GameNumber,
        sender_name: String,
        frequency: u32,
    ) -> Upsert {
        match self
            .entries
            .binary_search_by_key(&game_number, |e| e.game_number)
        {
            Ok(i) => {
                let entry = &mut self.entries[i];
                if entry.sender_name == sender_name && entry.frequency == frequency {
                    trace!("game {} already in directory", game_number);
                    return Upsert::Unchanged;
                }
                entry.sender_name = sender_name;
                entry.frequency = frequency;
                Upsert::Refreshed
            }
            Err(i) => {
                self.entries.insert(
                    i,
                    PeerGameEntry {
                        game_number,
                        sender_name,
                        frequency,
                    },
                );
                info!("game {} added at position {}", game_number, i);
                self.selected = match self.selected {
                    None => Some(i),
                    Some(s) if s >= i => Some(s + 1),
                    keep => keep,
                };
                Upsert::Inserted
            }
        }
    }

    /// Remove a game. If it was selected, selection moves to its successor, else to the head.
    pub fn remove(&mut self, game_number: GameNumber) -> bool {
        let Ok(i) = self
            .entries
            .binary_search_by_key(&game_number, |e| e.game_number)
        else {
            return false;
        };
        self.entries.remove(i);
        info!("game {} removed from directory", game_number);
        self.selected = match self.selected {
            _ if self.entries.is_empty() => None,
            Some(s) if s == i && i < self.entries.len() => Some(i),
            Some(s) if s == i => Some(0),
            Some(s) if s > i => Some(s - 1),
            keep => keep,
        };
        true
    }

    pub fn current(&self) -> Option<&PeerGameEntry> {
        self.selected.map(|i| &self.entries[i])
    }

    pub fn has_next(&self) -> bool {
        self.selected.is_some_and(|i| i + 1 < self.entries.len())
    }

    pub fn has_previous(&self) -> bool {
        self.selected.is_some_and(|i| i > 0)
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.selected = self.selected.map(|i| i + 1);
        }
    }

    pub fn previous(&mut self) {
        if self.has_previous() {
            self.selected = self.selected.map(|i| i - 1);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, game_number: GameNumber) -> Option<&PeerGameEntry> {
        self.entries
            .binary_search_by_key(&game_number, |e| e.game_number)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerGameEntry> {
        self.entries.iter()
    }
}
