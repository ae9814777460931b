//! Consensus parameters that vary between Bitcoin networks.

pub mod genesis;

use serde::{Deserialize, Serialize};

/// An instance of the Bitcoin protocol, identified by its own genesis block
/// and P2P magic bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// The production Bitcoin network.
    Mainnet,
    /// The test Bitcoin network.
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "Mainnet"),
            Network::Testnet => write!(f, "Testnet"),
        }
    }
}
