//! Forced oracle replies keyed by ply count.
//!
//! An entry `1:e7e5` means: when the oracle is to reply and exactly one move
//! has been played, it plays `e7e5` if that move is legal.

use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpeningBook {
    entries: BTreeMap<usize, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpeningBookError {
    #[error("opening book entry {0:?} is not of the form <ply>:<move>")]
    Malformed(String),
    #[error("opening book entry {0:?} has an invalid move")]
    InvalidMove(String),
}

impl OpeningBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The forced reply when `ply` moves have been played, if any.
    pub fn reply_at(&self, ply: usize) -> Option<&str> {
        self.entries.get(&ply).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromStr for OpeningBook {
    type Err = OpeningBookError;

    /// Parse `"1:e7e5,3:b8c6"`. Blank input gives an empty book.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut book = Self::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (ply, mv) = entry
                .split_once(':')
                .ok_or_else(|| OpeningBookError::Malformed(entry.to_string()))?;
            let ply: usize = ply
                .trim()
                .parse()
                .map_err(|_| OpeningBookError::Malformed(entry.to_string()))?;
            let mv = mv.trim().to_ascii_lowercase();
            chess::parse_uci_move(&mv)
                .map_err(|_| OpeningBookError::InvalidMove(entry.to_string()))?;
            book.entries.insert(ply, mv);
        }
        Ok(book)
    }
}
