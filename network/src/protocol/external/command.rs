//! The 12-byte, NUL-padded ASCII command name that appears in every frame header.

use std::io;

use btc_chain::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// The Bitcoin message type a frame's header declares.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    GetData,
    Inv,
    Block,
    NotFound,
    Reject,
}

impl Command {
    /// The ASCII name used on the wire, right-padded with NUL bytes to 12 bytes.
    pub fn bytes(&self) -> &'static [u8; 12] {
        match self {
            Command::Version => b"version\0\0\0\0\0",
            Command::Verack => b"verack\0\0\0\0\0\0",
            Command::Ping => b"ping\0\0\0\0\0\0\0\0",
            Command::Pong => b"pong\0\0\0\0\0\0\0\0",
            Command::GetData => b"getdata\0\0\0\0\0",
            Command::Inv => b"inv\0\0\0\0\0\0\0\0\0",
            Command::Block => b"block\0\0\0\0\0\0\0",
            Command::NotFound => b"notfound\0\0\0\0",
            Command::Reject => b"reject\0\0\0\0\0\0",
        }
    }
}

impl BitcoinSerialize for Command {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        target.write_all(self.bytes())
    }
}

impl BitcoinDeserialize for Command {
    fn bitcoin_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        let bytes = <[u8; 12]>::bitcoin_deserialize(reader)?;
        let trimmed = &bytes[..bytes.iter().position(|&b| b == 0).unwrap_or(12)];
        match trimmed {
            b"version" => Ok(Command::Version),
            b"verack" => Ok(Command::Verack),
            b"ping" => Ok(Command::Ping),
            b"pong" => Ok(Command::Pong),
            b"getdata" => Ok(Command::GetData),
            b"inv" => Ok(Command::Inv),
            b"block" => Ok(Command::Block),
            b"notfound" => Ok(Command::NotFound),
            b"reject" => Ok(Command::Reject),
            _ => Err(SerializationError::Parse("unrecognized command name")),
        }
    }
}
