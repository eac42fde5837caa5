//! Shared fakes for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{address, Address, LogData, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use relayer::chain::{ChainClient, Credential, SignedPayload, TxReceipt};
use relayer::contracts::{mintTokensCall, TokensLocked};
use relayer::cursor::{CursorStore, PairId};
use relayer::error::{ChainError, CursorError};
use relayer::pipeline::SubmissionPipeline;
use relayer::redact::Redacted;
use relayer::relay::{InitialScanBlock, RelayLoop, RelaySettings};
use relayer::retry::RetryConfig;
use relayer::scanner::EventScanner;
use relayer::translator::RelayTranslator;
use relayer::types::Cursor;

pub const SOURCE_CONTRACT: Address = address!("00000000000000000000000000000000000000a1");
pub const DESTINATION_CONTRACT: Address = address!("00000000000000000000000000000000000000b2");
pub const TOKEN: Address = address!("00000000000000000000000000000000000000aa");
pub const SENDER: Address = address!("00000000000000000000000000000000000000bb");
pub const RECIPIENT: Address = address!("00000000000000000000000000000000000000cc");

/// Anvil's first default account
pub const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn credential() -> Credential {
    Credential::from_hex(&Redacted(ANVIL_KEY.to_string())).unwrap()
}

/// Deterministic tx hash for test event `n`
pub fn tx_hash(n: u8) -> B256 {
    B256::repeat_byte(n)
}

pub fn lock_log(block: u64, log_index: u64, tx: B256, amount: u64) -> Log {
    let event = TokensLocked {
        token: TOKEN,
        sender: SENDER,
        recipient: RECIPIENT,
        amount: U256::from(amount),
        destinationChainId: U256::from(137u64),
    };
    Log {
        inner: alloy::primitives::Log {
            address: SOURCE_CONTRACT,
            data: event.encode_log_data(),
        },
        block_number: Some(block),
        transaction_hash: Some(tx),
        log_index: Some(log_index),
        ..Default::default()
    }
}

/// A log with the right topic0 but no indexed topics or data
pub fn malformed_log(block: u64, log_index: u64, tx: B256) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: SOURCE_CONTRACT,
            data: LogData::new_unchecked(vec![TokensLocked::SIGNATURE_HASH], Default::default()),
        },
        block_number: Some(block),
        transaction_hash: Some(tx),
        log_index: Some(log_index),
        ..Default::default()
    }
}

/// Decode the source tx hash a signed mint transaction carries
pub fn relayed_source_hash(payload: &SignedPayload) -> B256 {
    let envelope = TxEnvelope::decode_2718(&mut payload.raw.as_ref()).unwrap();
    let call = mintTokensCall::abi_decode(envelope.input(), true).unwrap();
    call.sourceTransactionHash
}

#[derive(Default)]
pub struct FakeState {
    pub head: u64,
    pub logs: Vec<Log>,
    /// Ranges wider than this are rejected
    pub max_range: Option<u64>,
    pub reject_all: bool,
    pub fail_head: bool,
    pub fail_logs: bool,
    pub get_logs_calls: Vec<(u64, u64)>,
    pub nonce: u64,
    pub nonce_calls: usize,
    /// 1-based nonce lookup that fails
    pub fail_nonce_on_call: Option<usize>,
    pub gas_price: u128,
    pub fail_gas_price: bool,
    pub fail_submit: bool,
    pub submitted: Vec<SignedPayload>,
}

/// In-memory node that serves logs like a real one: filtered by address,
/// topic0 and inclusive block range
pub struct FakeChain {
    chain_id: u64,
    pub state: Mutex<FakeState>,
}

impl FakeChain {
    pub fn new(chain_id: u64, head: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            state: Mutex::new(FakeState {
                head,
                gas_price: 1_000_000_000,
                ..Default::default()
            }),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn get_logs_calls(&self) -> Vec<(u64, u64)> {
        self.with(|s| s.get_logs_calls.clone())
    }

    pub fn submitted(&self) -> Vec<SignedPayload> {
        self.with(|s| s.submitted.clone())
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn head(&self) -> Result<u64, ChainError> {
        self.with(|s| {
            if s.fail_head {
                Err(ChainError::node("head", "connection reset"))
            } else {
                Ok(s.head)
            }
        })
    }

    async fn get_logs(
        &self,
        contract: Address,
        event_signature: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainError> {
        self.with(|s| {
            s.get_logs_calls.push((from_block, to_block));
            if s.fail_logs {
                return Err(ChainError::node("get_logs", "request timed out"));
            }
            let width = to_block - from_block + 1;
            if s.reject_all || s.max_range.is_some_and(|max| width > max) {
                return Err(ChainError::RangeRejected {
                    from: from_block,
                    to: to_block,
                    reason: "query returned more than 10000 results".into(),
                });
            }
            Ok(s.logs
                .iter()
                .filter(|log| log.address() == contract)
                .filter(|log| log.topics().first() == Some(&event_signature))
                .filter(|log| {
                    log.block_number
                        .is_some_and(|b| b >= from_block && b <= to_block)
                })
                .cloned()
                .collect())
        })
    }

    async fn account_nonce(&self, _address: Address) -> Result<u64, ChainError> {
        self.with(|s| {
            s.nonce_calls += 1;
            if s.fail_nonce_on_call == Some(s.nonce_calls) {
                Err(ChainError::node("account_nonce", "503 Service Unavailable"))
            } else {
                Ok(s.nonce)
            }
        })
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.with(|s| {
            if s.fail_gas_price {
                Err(ChainError::node("gas_price", "timeout"))
            } else {
                Ok(s.gas_price)
            }
        })
    }

    async fn submit(&self, payload: &SignedPayload) -> Result<TxReceipt, ChainError> {
        self.with(|s| {
            if s.fail_submit {
                return Err(ChainError::Submit("nonce too low".into()));
            }
            s.submitted.push(payload.clone());
            Ok(TxReceipt {
                tx_hash: payload.hash,
            })
        })
    }
}

/// Cursor store kept in memory, with a switch to make saves fail
#[derive(Default)]
pub struct MemoryStore {
    pub cursor: Mutex<Option<Cursor>>,
    pub saves: Mutex<Vec<u64>>,
    pub fail_save: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_cursor(block: u64) -> Arc<Self> {
        Arc::new(Self {
            cursor: Mutex::new(Some(Cursor::new(block))),
            ..Default::default()
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored(&self) -> Option<u64> {
        self.cursor.lock().unwrap().map(|c| c.last_scanned_block)
    }

    pub fn set_fail_save(&self, fail: bool) {
        *self.fail_save.lock().unwrap() = fail;
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn load(&self) -> Result<Option<Cursor>, CursorError> {
        Ok(*self.cursor.lock().unwrap())
    }

    async fn save(&self, cursor: Cursor) -> Result<(), CursorError> {
        if *self.fail_save.lock().unwrap() {
            return Err(CursorError::Io {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        *self.cursor.lock().unwrap() = Some(cursor);
        self.saves.lock().unwrap().push(cursor.last_scanned_block);
        Ok(())
    }
}

pub fn settings(max_blocks_per_scan: u64, initial: InitialScanBlock) -> RelaySettings {
    RelaySettings {
        poll_interval: Duration::from_millis(10),
        max_blocks_per_scan,
        confirmations: 0,
        initial_scan_block: initial,
        shrink_on_reject: false,
        event_signature: TokensLocked::SIGNATURE_HASH,
        retry: RetryConfig {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        },
    }
}

pub fn relay_loop(
    source: &Arc<FakeChain>,
    destination: &Arc<FakeChain>,
    store: Arc<dyn CursorStore>,
    settings: RelaySettings,
    dry_run: bool,
) -> RelayLoop<FakeChain, FakeChain> {
    RelayLoop::new(
        EventScanner::new(source.clone(), SOURCE_CONTRACT),
        RelayTranslator::new(DESTINATION_CONTRACT),
        SubmissionPipeline::new(destination.clone(), credential(), dry_run, 200_000),
        store,
        PairId::from_chain_ids(source.chain_id(), destination.chain_id()),
        settings,
    )
}
