//! JSON-RPC chain client over alloy's HTTP provider

use alloy::eips::BlockId;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{ChainClient, SignedPayload, TxReceipt};
use crate::error::ChainError;
use crate::retry::{classify_error, ErrorClass};

/// EVM node client
///
/// The HTTP transport opens connections per request, so a node that drops
/// out mid-run is simply retried on the next call.
pub struct EvmChainClient {
    provider: RootProvider<Http<Client>>,
    chain_id: u64,
}

impl EvmChainClient {
    /// Connect and verify the node answers by fetching its chain id
    pub async fn connect(rpc_url: &str) -> Result<Self, ChainError> {
        let url = rpc_url.parse().map_err(|e| ChainError::Connection {
            endpoint: rpc_url.to_string(),
            reason: format!("invalid RPC URL: {}", e),
        })?;
        let provider = ProviderBuilder::new().on_http(url);

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Connection {
                endpoint: rpc_url.to_string(),
                reason: e.to_string(),
            })?;

        info!(rpc_url = %rpc_url, chain_id, "Connected to EVM node");

        Ok(Self { provider, chain_id })
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn head(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::node("head", e))
    }

    async fn get_logs(
        &self,
        contract: Address,
        event_signature: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainError> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(event_signature)
            .from_block(from_block)
            .to_block(to_block);

        self.provider.get_logs(&filter).await.map_err(|e| {
            let reason = e.to_string();
            match classify_error(&reason) {
                ErrorClass::RangeRejected => ChainError::RangeRejected {
                    from: from_block,
                    to: to_block,
                    reason,
                },
                _ => ChainError::node("get_logs", reason),
            }
        })
    }

    async fn account_nonce(&self, address: Address) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(address)
            .block_id(BlockId::pending())
            .await
            .map_err(|e| ChainError::node("account_nonce", e))
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::node("gas_price", e))
    }

    async fn submit(&self, payload: &SignedPayload) -> Result<TxReceipt, ChainError> {
        debug!(
            tx_hash = %payload.hash,
            raw = %hex::encode(&payload.raw),
            "Sending raw transaction"
        );

        let pending = self
            .provider
            .send_raw_transaction(&payload.raw)
            .await
            .map_err(|e| {
                let reason = e.to_string();
                match classify_error(&reason) {
                    ErrorClass::Transient => ChainError::node("submit", reason),
                    _ => ChainError::Submit(reason),
                }
            })?;

        Ok(TxReceipt {
            tx_hash: *pending.tx_hash(),
        })
    }
}
