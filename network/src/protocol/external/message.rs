//! Definitions of network messages.

use std::fmt;
use std::sync::Arc;

use btc_chain::block;

use super::command::Command;
use super::inv::InventoryHash;
use super::types::Nonce;

mod version;
pub use version::Version;

/// A Bitcoin network message.
///
/// This enum stores an internal representation of a message; the
/// translation to and from the wire format (the 12-byte ASCII command name,
/// and the message-specific payload encoding) happens only in the codec.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Message {
    /// A `version` message, beginning a handshake (like a TLS `ClientHello`).
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#version)
    Version(Version),

    /// A `verack` message.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#verack)
    Verack,

    /// A `ping` message.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#ping)
    Ping(Nonce),

    /// A `pong` message, sent in reply to a `ping` with the same nonce.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#pong)
    Pong(Nonce),

    /// A `getdata` message, requesting the content of advertised inventory.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#getdata)
    GetData(Vec<InventoryHash>),

    /// An `inv` message, advertising known inventory.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#inv)
    Inv(Vec<InventoryHash>),

    /// A `block` message, carrying one serialized block.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#block)
    Block(Arc<block::Block>),

    /// A `notfound` message, sent in reply to a `getdata` for inventory the
    /// peer does not have.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#notfound)
    NotFound(Vec<InventoryHash>),

    /// A `reject` message.
    ///
    /// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#reject)
    Reject {
        /// The command of the rejected message.
        message: String,
        /// The CCode giving the reason for rejection.
        ccode: RejectReason,
        /// A human-readable rejection reason.
        reason: String,
        /// Optional extra data, usually the hash of the rejected object.
        data: Option<[u8; 32]>,
    },
}

/// Reject CCodes.
///
/// [Bitcoin reference](https://en.bitcoin.it/wiki/Protocol_documentation#reject)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum RejectReason {
    Malformed = 0x01,
    Invalid = 0x10,
    Obsolete = 0x11,
    Duplicate = 0x12,
    Nonstandard = 0x40,
    Dust = 0x41,
    InsufficientFee = 0x42,
    Checkpoint = 0x43,
    Other = 0x50,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Message::Version(_) => "version",
            Message::Verack => "verack",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::GetData(_) => "getdata",
            Message::Inv(_) => "inv",
            Message::Block(_) => "block",
            Message::NotFound(_) => "notfound",
            Message::Reject { .. } => "reject",
        })
    }
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Message::Version(_) => Command::Version,
            Message::Verack => Command::Verack,
            Message::Ping(_) => Command::Ping,
            Message::Pong(_) => Command::Pong,
            Message::GetData(_) => Command::GetData,
            Message::Inv(_) => Command::Inv,
            Message::Block(_) => Command::Block,
            Message::NotFound(_) => Command::NotFound,
            Message::Reject { .. } => Command::Reject,
        }
    }
}
