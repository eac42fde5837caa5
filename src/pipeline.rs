//! Destination submission pipeline
//!
//! nonce → gas price → build → sign → (broadcast | dry-run). In dry-run mode
//! the signed payload is produced and hashed but never sent, so operators can
//! check exactly what would go on chain.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::{CallParams, ChainClient, Credential};
use crate::error::SubmissionError;
use crate::types::{RelayAction, SubmissionMode, SubmissionReceipt};

pub struct SubmissionPipeline<C> {
    client: Arc<C>,
    credential: Credential,
    mode: SubmissionMode,
    gas_limit: u64,
    /// Last nonce broadcast by this process; guards against a node that lags
    /// in reflecting our own pending transactions
    last_nonce: Option<u64>,
}

impl<C: ChainClient> SubmissionPipeline<C> {
    pub fn new(client: Arc<C>, credential: Credential, dry_run: bool, gas_limit: u64) -> Self {
        let mode = if dry_run {
            SubmissionMode::DryRun
        } else {
            SubmissionMode::Broadcast
        };
        Self {
            client,
            credential,
            mode,
            gas_limit,
            last_nonce: None,
        }
    }

    pub fn mode(&self) -> SubmissionMode {
        self.mode
    }

    /// Run one action through the pipeline.
    ///
    /// A failure at any stage is returned to the caller and leaves no local
    /// state behind; the nonce is only recorded once the node accepted the
    /// transaction.
    pub async fn submit(
        &mut self,
        action: &RelayAction,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let from = self.credential.address();

        let chain_nonce = self
            .client
            .account_nonce(from)
            .await
            .map_err(SubmissionError::Nonce)?;
        let nonce = self.next_nonce(chain_nonce);

        let gas_price = self
            .client
            .gas_price()
            .await
            .map_err(SubmissionError::GasPrice)?;

        let params = CallParams {
            from,
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            chain_id: self.client.chain_id(),
        };
        let payload = self
            .client
            .build_call(action.target_contract, action.call_data(), &params);

        let signed = self
            .client
            .sign(payload, &self.credential)
            .await
            .map_err(SubmissionError::Signing)?;

        debug!(
            source_tx_hash = %action.idempotency_key,
            nonce,
            gas_price,
            payload_hash = %signed.hash,
            raw_tx = %hex::encode(&signed.raw),
            "Signed relay transaction"
        );

        match self.mode {
            SubmissionMode::DryRun => {
                info!(
                    source_tx_hash = %action.idempotency_key,
                    target = %action.target_contract,
                    function = action.function,
                    recipient = %action.recipient,
                    amount = %action.amount,
                    nonce,
                    tx_hash = %signed.hash,
                    "DRY RUN: transaction signed but not broadcast"
                );
                Ok(SubmissionReceipt {
                    tx_hash: signed.hash,
                    nonce,
                    mode: SubmissionMode::DryRun,
                })
            }
            SubmissionMode::Broadcast => {
                let receipt = self
                    .client
                    .submit(&signed)
                    .await
                    .map_err(SubmissionError::Submit)?;

                self.last_nonce = Some(nonce);

                if receipt.tx_hash != signed.hash {
                    warn!(
                        expected = %signed.hash,
                        reported = %receipt.tx_hash,
                        "Node reported a different transaction hash"
                    );
                }

                info!(
                    source_tx_hash = %action.idempotency_key,
                    target = %action.target_contract,
                    recipient = %action.recipient,
                    amount = %action.amount,
                    nonce,
                    tx_hash = %receipt.tx_hash,
                    "Relay transaction broadcast"
                );
                Ok(SubmissionReceipt {
                    tx_hash: receipt.tx_hash,
                    nonce,
                    mode: SubmissionMode::Broadcast,
                })
            }
        }
    }

    fn next_nonce(&self, chain_nonce: u64) -> u64 {
        match (self.mode, self.last_nonce) {
            (SubmissionMode::Broadcast, Some(last)) => chain_nonce.max(last.saturating_add(1)),
            _ => chain_nonce,
        }
    }
}
