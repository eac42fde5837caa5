//! Source event → destination action mapping
//!
//! Fixed 1:1 translation of a `TokensLocked` event into a `mintTokens` call.
//! Fee deduction or fan-out into several actions would be added here without
//! touching scanning or submission.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;

use crate::contracts::mintTokensCall;
use crate::types::{RelayAction, SourceEvent};

#[derive(Debug, Clone)]
pub struct RelayTranslator {
    destination_contract: Address,
}

impl RelayTranslator {
    pub fn new(destination_contract: Address) -> Self {
        Self {
            destination_contract,
        }
    }

    pub fn translate(&self, event: &SourceEvent) -> RelayAction {
        RelayAction {
            target_contract: self.destination_contract,
            function: mintTokensCall::SIGNATURE,
            token: event.token,
            recipient: event.recipient,
            amount: event.amount,
            idempotency_key: event.source_tx_hash,
        }
    }
}
