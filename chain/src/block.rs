//! Blocks and block-related structures (heights, headers, etc.)
#![allow(clippy::unit_arg)]

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;
mod hash;
mod header;
mod height;
#[cfg(test)]
mod tests;

use std::fmt;

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

use crate::compactint::CompactInt;
use crate::fmt::DisplayToDebug;
use crate::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

pub use hash::Hash;
pub use header::BlockTimeError;
pub use header::Header;
pub use height::Height;

/// The largest block payload this crate will allocate while parsing; matches
/// the maximum P2P message length enforced by the network layer's codec.
pub const MAX_BLOCK_BYTES: u64 = 2 * 1024 * 1024;

/// A Bitcoin block: a header plus its transaction list.
///
/// Parsing individual transactions out of `raw_transactions` is consensus
/// logic (it requires understanding script and witness encodings) and is out
/// of scope for this crate. Callers that need transaction contents should
/// hand `raw_transactions` to a dedicated consensus library; callers that
/// only need to store, forward, or hash whole blocks never have to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    /// The number of transactions `raw_transactions` claims to hold.
    pub transaction_count: u64,
    /// The serialized transaction list, exactly as it appeared on the wire.
    pub raw_transactions: Vec<u8>,
}

impl BitcoinSerialize for Block {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.bitcoin_serialize(&mut target)?;
        CompactInt::from(self.transaction_count as usize).bitcoin_serialize(&mut target)?;
        target.write_all(&self.raw_transactions)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("hash", &DisplayToDebug(self.hash()))
            .field("transaction_count", &self.transaction_count)
            .finish()
    }
}

impl Block {
    /// Compute the hash of this block (the double-SHA256 of its header).
    pub fn hash(&self) -> Hash {
        Hash::from(&self.header)
    }

    /// Deserializes a block. Since transaction boundaries are never
    /// inspected, `src` must contain exactly one block's payload (e.g. the
    /// body of a `block` message), not an arbitrary stream that could
    /// contain more than one block back to back.
    pub fn deserialize_from_buf(src: &mut BytesMut) -> Result<(Self, Hash), SerializationError> {
        if src.remaining() < Header::len() {
            return Err(SerializationError::Parse(
                "not enough bytes for block header",
            ));
        }
        let header_bytes = src.split_to(Header::len());
        let (header, hash) = Header::deserialize_from_buf(header_bytes)?;

        if src.remaining() as u64 > MAX_BLOCK_BYTES {
            return Err(SerializationError::Parse("block body exceeds MAX_BLOCK_BYTES"));
        }
        let transaction_count = CompactInt::bitcoin_deserialize(&mut src.reader())?.value();
        let raw_transactions = src.split_to(src.remaining()).to_vec();

        Ok((
            Block {
                header,
                transaction_count,
                raw_transactions,
            },
            hash,
        ))
    }
}
