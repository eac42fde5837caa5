//! Chain access seam
//!
//! Everything the relay engine needs from a node goes through [`ChainClient`]:
//! head height, log queries, account nonce and fees, payload construction,
//! signing and submission. [`EvmChainClient`] is the JSON-RPC implementation;
//! tests plug in in-memory fakes.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{keccak256, Address, Bytes, B256};
use alloy::rpc::types::{Log, TransactionRequest};
use async_trait::async_trait;

use crate::error::ChainError;

pub mod evm;
pub mod signer;

pub use evm::EvmChainClient;
pub use signer::Credential;

/// An unsigned destination call
pub type UnsignedPayload = TransactionRequest;

/// Per-transaction parameters resolved before building a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallParams {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: u64,
}

/// An EIP-2718 encoded, signed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub raw: Bytes,
    /// keccak256 of `raw`; equals the network transaction hash
    pub hash: B256,
}

/// Acknowledgement from the node that a transaction was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node at connect time
    fn chain_id(&self) -> u64;

    /// Current block height
    async fn head(&self) -> Result<u64, ChainError>;

    /// Logs emitted by `contract` with topic0 `event_signature`, inclusive range
    async fn get_logs(
        &self,
        contract: Address,
        event_signature: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, ChainError>;

    /// Next nonce for `address`, counting pending transactions
    async fn account_nonce(&self, address: Address) -> Result<u64, ChainError>;

    /// Current legacy gas price in wei
    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Broadcast a signed payload
    async fn submit(&self, payload: &SignedPayload) -> Result<TxReceipt, ChainError>;

    /// Build a legacy call transaction to `contract`
    fn build_call(&self, contract: Address, call_data: Bytes, params: &CallParams) -> UnsignedPayload {
        TransactionRequest::default()
            .with_from(params.from)
            .with_to(contract)
            .with_input(call_data)
            .with_nonce(params.nonce)
            .with_gas_price(params.gas_price)
            .with_gas_limit(params.gas_limit)
            .with_chain_id(params.chain_id)
    }

    /// Sign offline with the relayer credential
    async fn sign(
        &self,
        payload: UnsignedPayload,
        credential: &Credential,
    ) -> Result<SignedPayload, ChainError> {
        let envelope =
            <TransactionRequest as TransactionBuilder<Ethereum>>::build(payload, credential.wallet())
                .await
                .map_err(|e| ChainError::Signing(e.to_string()))?;

        let raw: Bytes = envelope.encoded_2718().into();
        let hash = keccak256(&raw);
        Ok(SignedPayload { raw, hash })
    }
}
