//! Source chain event scanner
//!
//! Fetches `TokensLocked` logs for one bounded block range and decodes them
//! into [`SourceEvent`]s in ascending `(block_number, log_index)` order.
//!
//! A range the node refuses to serve is reported as
//! [`ScanOutcome::RangeRejected`], which is distinct from a range that simply
//! holds no events: the first must not advance the cursor, the second must.

use alloy::primitives::{Address, B256};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::error::ChainError;
use crate::types::{BlockRange, SourceEvent};

/// Result of scanning one block range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The range was served; the list may be empty
    Found(Vec<SourceEvent>),
    /// The node refused the range; nothing was scanned
    RangeRejected { reason: String },
}

impl ScanOutcome {
    /// Events discovered (empty when the range was rejected)
    pub fn events(&self) -> &[SourceEvent] {
        match self {
            ScanOutcome::Found(events) => events,
            ScanOutcome::RangeRejected { .. } => &[],
        }
    }
}

pub struct EventScanner<C> {
    client: Arc<C>,
    contract: Address,
}

impl<C: ChainClient> EventScanner<C> {
    pub fn new(client: Arc<C>, contract: Address) -> Self {
        Self { client, contract }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Scan `range` for logs with topic0 `event_signature`.
    ///
    /// Transient node failures are returned as errors so the caller retries
    /// the whole range; they are never reported as "no events".
    pub async fn scan(
        &self,
        range: BlockRange,
        event_signature: B256,
    ) -> Result<ScanOutcome, ChainError> {
        debug!(
            chain_id = self.client.chain_id(),
            from_block = range.from(),
            to_block = range.to(),
            "Scanning for lock events"
        );

        let logs = match self
            .client
            .get_logs(self.contract, event_signature, range.from(), range.to())
            .await
        {
            Ok(logs) => logs,
            Err(ChainError::RangeRejected { reason, .. }) => {
                warn!(
                    chain_id = self.client.chain_id(),
                    from_block = range.from(),
                    to_block = range.to(),
                    reason = %reason,
                    "Block range rejected by node"
                );
                return Ok(ScanOutcome::RangeRejected { reason });
            }
            Err(e) => return Err(e),
        };

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                debug!(tx_hash = ?log.transaction_hash, "Skipping removed log");
                continue;
            }
            if log.topics().first() != Some(&event_signature) {
                continue;
            }

            match SourceEvent::from_log(&log) {
                Ok(event) => {
                    if event.block_number < range.from() || event.block_number > range.to() {
                        warn!(
                            source_tx_hash = %event.source_tx_hash,
                            block_number = event.block_number,
                            range = %range,
                            "Node returned a log outside the requested range, skipping"
                        );
                        continue;
                    }
                    events.push(event);
                }
                Err(e) => {
                    error!(
                        tx_hash = ?log.transaction_hash,
                        log_index = ?log.log_index,
                        error = %e,
                        "Failed to decode lock event"
                    );
                }
            }
        }

        events.sort_by_key(SourceEvent::position);
        events.dedup_by(|a, b| a.source_tx_hash == b.source_tx_hash && a.log_index == b.log_index);

        if !events.is_empty() {
            info!(
                chain_id = self.client.chain_id(),
                from_block = range.from(),
                to_block = range.to(),
                event_count = events.len(),
                "Found lock events"
            );
        }

        Ok(ScanOutcome::Found(events))
    }
}
