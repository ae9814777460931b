use std::io::Write;

use bytes::Buf;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{serialization::sha256d, BitcoinDeserialize, BitcoinSerialize, SerializationError};
use bitcoin_serde_derive::{BtcDeserialize, BtcSerialize};

use super::{Hash, Height};

/// A block header, containing metadata about a block.
///
/// Blocks are chained together via the backwards reference (previous header
/// hash) present in the block header. Each block points backwards to its
/// parent, all the way back to the genesis block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, BtcSerialize, BtcDeserialize)]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The hash of the previous block, used to create a chain of blocks back
    /// to the genesis block.
    pub previous_block_hash: Hash,

    /// The root of the transaction Merkle tree, binding the block header to
    /// the transactions in the block. Computing this root from a block's
    /// transactions is consensus logic and out of scope here; it is carried
    /// as an opaque 32-byte value.
    pub merkle_root: [u8; 32],

    /// The block timestamp, a Unix epoch time (UTC) when the miner started
    /// hashing the header (according to the miner).
    pub time: DateTime<Utc>,

    /// The encoded target threshold this block's header hash must be less
    /// than or equal to, in the compact "nBits" format used by Bitcoin.
    pub bits: u32,

    /// An arbitrary field that miners vary to produce a header hash less
    /// than or equal to the target threshold.
    pub nonce: u32,
}

#[derive(Error, Debug)]
pub enum BlockTimeError {
    #[error("invalid time {0:?} in block header at height {1:?}: block time is more than 2 hours in the future ({2:?}). Hint: check your machine's date, time, and time zone.")]
    InvalidBlockTime(DateTime<Utc>, Height, DateTime<Utc>),
}

impl Header {
    /// The length of a serialized header, in bytes.
    pub const fn len() -> usize {
        80
    }

    pub fn new(
        version: u32,
        previous_block_hash: Hash,
        merkle_root: [u8; 32],
        time: DateTime<Utc>,
        bits: u32,
        nonce: u32,
    ) -> Header {
        Header {
            version,
            previous_block_hash,
            merkle_root,
            time,
            bits,
            nonce,
        }
    }

    pub fn time_is_valid_at(
        &self,
        now: DateTime<Utc>,
        height: &Height,
    ) -> Result<(), BlockTimeError> {
        let two_hours_in_the_future = now
            .checked_add_signed(Duration::hours(2))
            .expect("calculating 2 hours in the future does not overflow");
        if self.time <= two_hours_in_the_future {
            Ok(())
        } else {
            Err(BlockTimeError::InvalidBlockTime(
                self.time,
                *height,
                two_hours_in_the_future,
            ))
        }
    }

    pub fn bitcoin_serialize_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Header::len());
        self.bitcoin_serialize(&mut out)
            .expect("serializing into a Vec is infallible");
        out
    }

    /// Deserializes a block header from a [`Buf`], hashing it along the way
    /// so callers don't have to re-serialize the header just to compute its
    /// hash.
    pub fn deserialize_from_buf<B: Buf>(mut src: B) -> Result<(Self, Hash), SerializationError> {
        if src.remaining() < Header::len() {
            return Err(SerializationError::Parse(
                "not enough bytes in block header",
            ));
        }
        // Zero-copy if the underlying buffer is a Bytes/BytesMut.
        let header_bytes = src.copy_to_bytes(Header::len());

        let mut hash_writer = sha256d::Writer::default();
        hash_writer
            .write_all(&header_bytes[..])
            .expect("Sha256dWriter is infallible");
        let hash = Hash(hash_writer.finish());

        let mut reader = std::io::Cursor::new(header_bytes);
        let header = Header {
            version: u32::bitcoin_deserialize(&mut reader)?,
            previous_block_hash: Hash::bitcoin_deserialize(&mut reader)?,
            merkle_root: <[u8; 32]>::bitcoin_deserialize(&mut reader)?,
            time: <DateTime<Utc>>::bitcoin_deserialize(&mut reader)?,
            bits: u32::bitcoin_deserialize(&mut reader)?,
            nonce: u32::bitcoin_deserialize(&mut reader)?,
        };
        Ok((header, hash))
    }
}
