//! JSON file cursor store
//!
//! Writes go to a sibling temp file which is fsynced and then renamed over
//! the record, so a reader only ever sees a complete old or new value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{CursorStore, PairId};
use crate::error::CursorError;
use crate::types::Cursor;

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct CursorRecord {
    pair: String,
    last_scanned_block: u64,
    updated_at: DateTime<Utc>,
}

pub struct FileCursorStore {
    pair: PairId,
    path: PathBuf,
}

impl FileCursorStore {
    /// Store for `pair` under `dir` (`relayer_state.<pair>.json`)
    pub fn new(dir: impl AsRef<Path>, pair: PairId) -> Self {
        let path = dir
            .as_ref()
            .join(format!("relayer_state.{}.json", pair.file_stem()));
        Self { pair, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> CursorError {
        CursorError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Persist the rename itself. Returns whether the directory was synced.
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> bool {
    let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return true;
    };
    let result = match tokio::fs::File::open(dir).await {
        Ok(handle) => handle.sync_all().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to sync cursor directory, rename may not be durable");
            false
        }
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> bool {
    true
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Option<Cursor>, CursorError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cursor file");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cursor file unreadable, treating as unset");
                return Ok(None);
            }
        };

        let record: CursorRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cursor file corrupt, treating as unset");
                return Ok(None);
            }
        };

        if record.pair != self.pair.as_str() {
            warn!(
                path = %self.path.display(),
                stored_pair = %record.pair,
                expected_pair = %self.pair,
                "Cursor file belongs to another pair, treating as unset"
            );
            return Ok(None);
        }

        Ok(Some(Cursor::new(record.last_scanned_block)))
    }

    async fn save(&self, cursor: Cursor) -> Result<(), CursorError> {
        let record = CursorRecord {
            pair: self.pair.to_string(),
            last_scanned_block: cursor.last_scanned_block,
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&record)?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| Self::io_error(&tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| Self::io_error(&tmp, e))?;
        file.sync_all().await.map_err(|e| Self::io_error(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Self::io_error(&self.path, e))?;

        sync_parent_dir(&self.path).await;

        debug!(
            path = %self.path.display(),
            last_scanned_block = cursor.last_scanned_block,
            "Cursor saved"
        );
        Ok(())
    }
}
