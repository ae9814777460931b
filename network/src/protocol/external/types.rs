//! Newtype wrappers for primitive values used in the Bitcoin wire protocol.

use std::io;

use bitcoin_serde_derive::{BtcDeserialize, BtcSerialize};
use btc_chain::parameters::Network;
use btc_chain::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
#[cfg(test)]
use proptest_derive::Arbitrary;

/// A nonce used to identify `ping`/`pong` pairs and detect self-connections.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, BtcSerialize, BtcDeserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct Nonce(pub u64);

/// The protocol version advertised in a handshake.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, BtcSerialize, BtcDeserialize)]
pub struct ProtocolVersion(pub u32);

bitflags::bitflags! {
    /// Service bits advertised by a peer in its `version` message.
    #[derive(Default)]
    pub struct PeerServices: u64 {
        /// Full node, able to serve full blocks.
        const NODE_NETWORK = 1;
    }
}

impl BitcoinSerialize for PeerServices {
    fn bitcoin_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.bits().bitcoin_serialize(target)
    }
}

impl BitcoinDeserialize for PeerServices {
    fn bitcoin_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        let bits = u64::bitcoin_deserialize(reader)?;
        Ok(PeerServices::from_bits_truncate(bits))
    }
}

/// The four magic bytes that begin every frame, identifying the network.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Magic(pub [u8; 4]);

impl std::fmt::Debug for Magic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Magic").field(&hex::encode(&self.0)).finish()
    }
}

impl From<Network> for Magic {
    fn from(network: Network) -> Self {
        match network {
            Network::Mainnet => Magic([0xF9, 0xBE, 0xB4, 0xD9]),
            Network::Testnet => Magic([0x0B, 0x11, 0x09, 0x07]),
        }
    }
}

impl BitcoinSerialize for Magic {
    fn bitcoin_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.bitcoin_serialize(target)
    }
}

impl BitcoinDeserialize for Magic {
    fn bitcoin_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Magic(<[u8; 4]>::bitcoin_deserialize(reader)?))
    }
}
