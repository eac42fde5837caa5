//! Durable scan cursor
//!
//! One record per source→destination pair holding the last fully scanned
//! source block. The relay loop is the only writer. A crash during `save`
//! must leave either the previous or the new value readable.

use alloy::primitives::keccak256;
use async_trait::async_trait;
use std::fmt;

use crate::error::CursorError;
use crate::types::Cursor;

pub mod file;
pub mod postgres;

pub use file::FileCursorStore;
pub use postgres::PgCursorStore;

/// Identifies a source→destination relay pair; keys the cursor record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairId(String);

impl PairId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Default key derived from the two chain ids
    pub fn from_chain_ids(source_chain_id: u64, destination_chain_id: u64) -> Self {
        Self(format!("{}-{}", source_chain_id, destination_chain_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_file_safe(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    }

    /// Filesystem-safe form of the id.
    ///
    /// Ids that needed rewriting get a `.`-separated keccak suffix of the raw
    /// id, so two distinct ids never share a file.
    pub fn file_stem(&self) -> String {
        if self.0.chars().all(Self::is_file_safe) {
            return self.0.clone();
        }
        let sanitized: String = self
            .0
            .chars()
            .map(|c| if Self::is_file_safe(c) { c } else { '_' })
            .collect();
        let digest = keccak256(self.0.as_bytes());
        format!("{}.{}", sanitized, hex::encode(&digest[..8]))
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Stored cursor, `None` when unset. A missing or unreadable record is
    /// `None`; errors are reserved for a backend that cannot be reached.
    async fn load(&self) -> Result<Option<Cursor>, CursorError>;

    /// Atomically replace the stored cursor
    async fn save(&self, cursor: Cursor) -> Result<(), CursorError>;
}
