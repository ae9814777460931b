//! Chain data structures for the Bitcoin P2P protocol: blocks, block headers,
//! and the variable-length integer and wire-serialization primitives they are
//! built from.

pub mod block;
pub mod compactint;
pub mod fmt;
pub mod parameters;
pub mod serialization;

pub use serialization::{BitcoinDeserialize, BitcoinDeserializeInto, BitcoinSerialize, SerializationError};
