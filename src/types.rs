//! Core data model of the relay engine

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::{SolCall, SolEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contracts::{mintTokensCall, TokensLocked};
use crate::error::ChainError;

/// Inclusive block range, `from <= to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    from: u64,
    to: u64,
}

impl BlockRange {
    /// Returns `None` when `from > to`
    pub fn new(from: u64, to: u64) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    pub fn from(&self) -> u64 {
        self.from
    }

    pub fn to(&self) -> u64 {
        self.to
    }

    /// Number of blocks covered, always at least 1
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// A decoded `TokensLocked` event, identified by `(source_tx_hash, log_index)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    pub source_tx_hash: B256,
    pub log_index: u64,
    pub token: Address,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
    pub destination_chain_id: U256,
    pub block_number: u64,
}

impl SourceEvent {
    /// Decode and validate a raw log.
    ///
    /// The topic layout and data length are checked by the generated binding;
    /// the positional metadata has to be present because it forms the event's
    /// identity and ordering key.
    pub fn from_log(log: &Log) -> Result<Self, ChainError> {
        let decoded = TokensLocked::decode_log(&log.inner, true)
            .map_err(|e| ChainError::Decode(e.to_string()))?;

        let source_tx_hash = log
            .transaction_hash
            .ok_or_else(|| ChainError::Decode("missing transaction hash".into()))?;
        let block_number = log
            .block_number
            .ok_or_else(|| ChainError::Decode("missing block number".into()))?;
        let log_index = log
            .log_index
            .ok_or_else(|| ChainError::Decode("missing log index".into()))?;

        let event = decoded.data;
        Ok(Self {
            source_tx_hash,
            log_index,
            token: event.token,
            sender: event.sender,
            recipient: event.recipient,
            amount: event.amount,
            destination_chain_id: event.destinationChainId,
            block_number,
        })
    }

    /// Processing order key
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// One destination-chain call derived from one [`SourceEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAction {
    pub target_contract: Address,
    pub function: &'static str,
    pub token: Address,
    pub recipient: Address,
    pub amount: U256,
    /// The source transaction hash, passed through so the destination
    /// contract can refuse a duplicate relay
    pub idempotency_key: B256,
}

impl RelayAction {
    /// ABI-encoded `mintTokens` calldata
    pub fn call_data(&self) -> Bytes {
        mintTokensCall {
            token: self.token,
            recipient: self.recipient,
            amount: self.amount,
            sourceTransactionHash: self.idempotency_key,
        }
        .abi_encode()
        .into()
    }
}

/// Last fully scanned source block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    pub last_scanned_block: u64,
}

impl Cursor {
    pub fn new(last_scanned_block: u64) -> Self {
        Self { last_scanned_block }
    }

    /// First block not yet covered
    pub fn next_block(&self) -> u64 {
        self.last_scanned_block.saturating_add(1)
    }
}

/// Whether a submission went to the network or was only simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    DryRun,
    Broadcast,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::DryRun => "dry_run",
            SubmissionMode::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Network tx hash, or the content hash of the signed payload in dry-run
    pub tx_hash: B256,
    pub nonce: u64,
    pub mode: SubmissionMode,
}
