//! Bridge contract ABI definition
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the lock event
//! watched on the source chain and the mint call made on the destination chain.

use alloy::sol;

sol! {
    /// Lock-and-mint bridge interface shared by both sides of a pair
    contract TokenBridge {
        /// Emitted on the source chain when tokens are locked for bridging
        event TokensLocked(
            address indexed token,
            address indexed sender,
            address indexed recipient,
            uint256 amount,
            uint256 destinationChainId
        );

        /// Credit `amount` of `token` to `recipient` on the destination chain.
        /// `sourceTransactionHash` lets the contract reject a replayed relay.
        function mintTokens(
            address token,
            address recipient,
            uint256 amount,
            bytes32 sourceTransactionHash
        ) external;
    }
}

pub use TokenBridge::{mintTokensCall, TokensLocked};
