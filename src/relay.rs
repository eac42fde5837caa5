//! Relay loop
//!
//! Drives one source→destination pair through
//! `Starting → CatchingUp → Idle ⇄ CatchingUp → ShuttingDown`.
//!
//! Each catch-up cycle scans one bounded range, hands every event to the
//! translator and pipeline in order, and only then advances and persists the
//! cursor. Advancement is a barrier: blocks at or below the persisted cursor
//! have had every matching event submitted (or recorded as failed) at least
//! once.

use alloy::primitives::B256;
use eyre::{eyre, Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::cursor::{CursorStore, PairId};
use crate::pipeline::SubmissionPipeline;
use crate::retry::RetryConfig;
use crate::scanner::{EventScanner, ScanOutcome};
use crate::server::{Metrics, RelayStats, SharedMetrics, SharedStats};
use crate::translator::RelayTranslator;
use crate::types::{BlockRange, Cursor, SubmissionMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Starting,
    CatchingUp,
    Idle,
    ShuttingDown,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::Starting => "starting",
            RelayState::CatchingUp => "catching_up",
            RelayState::Idle => "idle",
            RelayState::ShuttingDown => "shutting_down",
        }
    }
}

/// Where to start when no cursor has been stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialScanBlock {
    /// Current (confirmed) head; only blocks produced afterwards are scanned
    Latest,
    /// Treat this block as already scanned
    Block(u64),
}

impl std::str::FromStr for InitialScanBlock {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(InitialScanBlock::Latest);
        }
        s.parse::<u64>()
            .map(InitialScanBlock::Block)
            .map_err(|_| eyre!("initial scan block must be \"latest\" or a block number, got {:?}", s))
    }
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub poll_interval: Duration,
    pub max_blocks_per_scan: u64,
    pub confirmations: u64,
    pub initial_scan_block: InitialScanBlock,
    /// Halve the chunk after a rejected range instead of retrying it as is
    pub shrink_on_reject: bool,
    pub event_signature: B256,
    pub retry: RetryConfig,
}

/// Result of one catch-up cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// `range` was scanned and the cursor now sits at its end
    Advanced {
        range: BlockRange,
        more_backlog: bool,
        events: usize,
        failed_submissions: usize,
    },
    /// Nothing new below the confirmed head
    UpToDate { safe_head: u64 },
    /// The node refused `range`; the cursor did not move
    RangeRejected { range: BlockRange },
}

pub struct RelayLoop<S, D> {
    scanner: EventScanner<S>,
    translator: RelayTranslator,
    pipeline: SubmissionPipeline<D>,
    store: Arc<dyn CursorStore>,
    pair: PairId,
    settings: RelaySettings,
    metrics: SharedMetrics,
    stats: SharedStats,
    state: RelayState,
    cursor: Option<Cursor>,
    /// Advanced in memory but not yet persisted
    unsaved: bool,
    chunk_size: u64,
    consecutive_failures: u32,
}

impl<S: ChainClient, D: ChainClient> RelayLoop<S, D> {
    pub fn new(
        scanner: EventScanner<S>,
        translator: RelayTranslator,
        pipeline: SubmissionPipeline<D>,
        store: Arc<dyn CursorStore>,
        pair: PairId,
        settings: RelaySettings,
    ) -> Self {
        let chunk_size = settings.max_blocks_per_scan.max(1);
        let stats = RelayStats {
            pair_id: pair.to_string(),
            state: RelayState::Starting.as_str(),
            dry_run: pipeline.mode() == SubmissionMode::DryRun,
            ..Default::default()
        };
        Self {
            scanner,
            translator,
            pipeline,
            store,
            pair,
            settings,
            metrics: Arc::new(Metrics::new()),
            stats: Arc::new(RwLock::new(stats)),
            state: RelayState::Starting,
            cursor: None,
            unsaved: false,
            chunk_size,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// Current effective blocks-per-scan
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Resolve the starting cursor and persist it.
    ///
    /// A stored cursor always wins over `initial_scan_block`.
    pub async fn start(&mut self) -> Result<Cursor> {
        let cursor = match self
            .store
            .load()
            .await
            .wrap_err("Failed to load cursor")?
        {
            Some(cursor) => {
                info!(
                    pair = %self.pair,
                    last_scanned_block = cursor.last_scanned_block,
                    "Resuming from stored cursor"
                );
                cursor
            }
            None => {
                let cursor = match self.settings.initial_scan_block {
                    InitialScanBlock::Latest => {
                        let head = self
                            .scanner
                            .client()
                            .head()
                            .await
                            .wrap_err("Failed to fetch source head")?;
                        Cursor::new(head.saturating_sub(self.settings.confirmations))
                    }
                    InitialScanBlock::Block(block) => Cursor::new(block),
                };
                info!(
                    pair = %self.pair,
                    initial = ?self.settings.initial_scan_block,
                    last_scanned_block = cursor.last_scanned_block,
                    "No stored cursor, starting fresh"
                );
                cursor
            }
        };

        self.store
            .save(cursor)
            .await
            .wrap_err("Failed to persist initial cursor")?;

        self.cursor = Some(cursor);
        self.metrics
            .last_scanned_block
            .set(cursor.last_scanned_block as i64);
        self.metrics.scan_chunk_size.set(self.chunk_size as i64);
        {
            let mut stats = self.stats.write().await;
            stats.last_scanned_block = Some(cursor.last_scanned_block);
        }
        self.transition(RelayState::CatchingUp).await;
        Ok(cursor)
    }

    /// Run one catch-up cycle.
    ///
    /// The cursor only ever moves forward, and only after every event in the
    /// scanned range went through the pipeline. If persisting fails the
    /// in-memory cursor stays advanced and the error is returned; every later
    /// cycle, including idle and rejected ones, retries the save first.
    pub async fn catch_up(&mut self) -> Result<CycleOutcome> {
        let cursor = self
            .cursor
            .ok_or_else(|| eyre!("relay loop has not been started"))?;
        self.metrics.cycles_total.inc();

        let from = cursor.next_block();
        let head = self
            .scanner
            .client()
            .head()
            .await
            .wrap_err("Failed to fetch source head")?;
        let safe_head = head.saturating_sub(self.settings.confirmations);
        self.metrics.safe_head_block.set(safe_head as i64);
        self.stats.write().await.safe_head = safe_head;

        let to = safe_head.min(from.saturating_add(self.chunk_size - 1));
        let Some(range) = BlockRange::new(from, to) else {
            debug!(pair = %self.pair, from_block = from, safe_head, "No new blocks");
            self.persist().await?;
            return Ok(CycleOutcome::UpToDate { safe_head });
        };

        let events = match self
            .scanner
            .scan(range, self.settings.event_signature)
            .await
            .wrap_err_with(|| format!("Failed to scan {}", range))?
        {
            ScanOutcome::Found(events) => events,
            ScanOutcome::RangeRejected { .. } => {
                self.metrics.range_rejections_total.inc();
                self.on_range_rejected(range);
                self.persist().await?;
                return Ok(CycleOutcome::RangeRejected { range });
            }
        };

        self.metrics.events_discovered_total.inc_by(events.len() as u64);
        let mut failed_submissions = 0;
        for event in &events {
            info!(
                source_tx_hash = %event.source_tx_hash,
                log_index = event.log_index,
                block_number = event.block_number,
                token = %event.token,
                sender = %event.sender,
                recipient = %event.recipient,
                amount = %event.amount,
                "Lock event discovered"
            );
            let action = self.translator.translate(event);
            match self.pipeline.submit(&action).await {
                Ok(receipt) => {
                    self.metrics.submissions_succeeded_total.inc();
                    debug!(
                        source_tx_hash = %event.source_tx_hash,
                        tx_hash = %receipt.tx_hash,
                        mode = %receipt.mode,
                        "Submission recorded"
                    );
                }
                Err(e) => {
                    failed_submissions += 1;
                    self.metrics
                        .submissions_failed_total
                        .with_label_values(&[e.stage()])
                        .inc();
                    error!(
                        source_tx_hash = %event.source_tx_hash,
                        log_index = event.log_index,
                        block_number = event.block_number,
                        target = %action.target_contract,
                        recipient = %action.recipient,
                        amount = %action.amount,
                        stage = e.stage(),
                        error = %e,
                        "Relay submission failed; event needs manual reconciliation"
                    );
                }
            }
        }

        {
            let mut stats = self.stats.write().await;
            stats.events_discovered += events.len() as u64;
            stats.submissions_succeeded += (events.len() - failed_submissions) as u64;
            stats.submissions_failed += failed_submissions as u64;
            stats.last_scanned_block = Some(range.to());
        }

        let advanced = Cursor::new(range.to());
        if advanced > cursor {
            self.cursor = Some(advanced);
            self.unsaved = true;
        }
        self.metrics.blocks_scanned_total.inc_by(range.block_count());
        self.metrics
            .last_scanned_block
            .set(advanced.last_scanned_block as i64);
        self.grow_chunk();

        info!(
            pair = %self.pair,
            from_block = range.from(),
            to_block = range.to(),
            events = events.len(),
            failed_submissions,
            "Range scanned"
        );

        self.persist().await?;

        Ok(CycleOutcome::Advanced {
            range,
            more_backlog: range.to() < safe_head,
            events: events.len(),
            failed_submissions,
        })
    }

    /// Drive the state machine until `shutdown` fires or its sender is dropped.
    ///
    /// Shutdown is observed during every sleep and between cycles; a cycle in
    /// progress always reaches its persistence step first.
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        loop {
            match self.state {
                RelayState::Starting => {
                    self.start().await?;
                }
                RelayState::CatchingUp => {
                    let next = match self.catch_up().await {
                        Ok(outcome) => {
                            self.record_success().await;
                            match outcome {
                                CycleOutcome::Advanced {
                                    more_backlog: true, ..
                                } => RelayState::CatchingUp,
                                _ => RelayState::Idle,
                            }
                        }
                        Err(e) => {
                            self.record_failure(&e).await;
                            RelayState::Idle
                        }
                    };

                    match shutdown.try_recv() {
                        Err(TryRecvError::Empty) => self.transition(next).await,
                        Ok(()) | Err(TryRecvError::Disconnected) => {
                            info!("Shutdown signal received");
                            self.transition(RelayState::ShuttingDown).await;
                        }
                    }
                }
                RelayState::Idle => {
                    let delay = self.idle_delay();
                    tokio::select! {
                        _ = shutdown.recv() => {
                            info!("Shutdown signal received");
                            self.transition(RelayState::ShuttingDown).await;
                        }
                        _ = tokio::time::sleep(delay) => {
                            self.transition(RelayState::CatchingUp).await;
                        }
                    }
                }
                RelayState::ShuttingDown => {
                    self.final_save().await;
                    info!(pair = %self.pair, cursor = ?self.cursor, "Relay loop stopped");
                    return Ok(());
                }
            }
        }
    }

    async fn persist(&mut self) -> Result<()> {
        let Some(cursor) = self.cursor else {
            return Ok(());
        };
        if !self.unsaved {
            return Ok(());
        }
        self.store
            .save(cursor)
            .await
            .wrap_err_with(|| format!("Failed to persist cursor {}", cursor.last_scanned_block))?;
        self.unsaved = false;
        Ok(())
    }

    async fn final_save(&mut self) {
        if let Err(e) = self.persist().await {
            error!(error = %format!("{:#}", e), cursor = ?self.cursor, "Final cursor save failed");
        }
    }

    fn on_range_rejected(&mut self, range: BlockRange) {
        if self.settings.shrink_on_reject && self.chunk_size > 1 {
            self.chunk_size = (self.chunk_size / 2).max(1);
            warn!(
                pair = %self.pair,
                range = %range,
                chunk_size = self.chunk_size,
                "Range rejected, reducing blocks per scan"
            );
        } else {
            warn!(
                pair = %self.pair,
                range = %range,
                chunk_size = self.chunk_size,
                "Range rejected, will retry; consider lowering MAX_BLOCKS_PER_SCAN"
            );
        }
        self.metrics.scan_chunk_size.set(self.chunk_size as i64);
    }

    fn grow_chunk(&mut self) {
        let max = self.settings.max_blocks_per_scan.max(1);
        if self.chunk_size < max {
            self.chunk_size = self.chunk_size.saturating_mul(2).min(max);
            debug!(chunk_size = self.chunk_size, "Increasing blocks per scan");
            self.metrics.scan_chunk_size.set(self.chunk_size as i64);
        }
    }

    fn idle_delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            self.settings.poll_interval
        } else {
            self.settings
                .retry
                .backoff_for_attempt(self.consecutive_failures - 1)
        }
    }

    async fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                previous_failures = self.consecutive_failures,
                "Relay cycle recovered"
            );
        }
        self.consecutive_failures = 0;
        self.metrics.consecutive_failures.set(0);
        self.stats.write().await.consecutive_failures = 0;
    }

    async fn record_failure(&mut self, e: &eyre::Report) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.metrics.cycle_failures_total.inc();
        self.metrics
            .consecutive_failures
            .set(self.consecutive_failures as i64);
        self.stats.write().await.consecutive_failures = self.consecutive_failures;
        error!(
            pair = %self.pair,
            consecutive_failures = self.consecutive_failures,
            backoff_ms = self.idle_delay().as_millis() as u64,
            error = %format!("{:#}", e),
            "Relay cycle failed"
        );
    }

    async fn transition(&mut self, next: RelayState) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "State transition");
            self.state = next;
            self.stats.write().await.state = next.as_str();
        }
    }
}
