//! Encoding and decoding of Bitcoin P2P messages to and from their wire form.
//!
//! Unlike a `tokio_util::codec` stream adapter, framing here is driven by the
//! peer transport's own sequential `read_exact` calls (see `crate::peer`), so
//! this module only supplies the pure encode/decode logic: assembling a full
//! frame from a message, and parsing a 24-byte header once it has been read.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use btc_chain::{
    block,
    parameters::Network,
    serialization::sha256d,
    BitcoinDeserialize, BitcoinSerialize,
};

use crate::constants::HEADER_LEN;
use crate::error::PeerError;

use super::command::Command;
use super::inv::InventoryHash;
use super::message::{Message, RejectReason, Version};
use super::types::{Magic, Nonce, ProtocolVersion};

/// Serializes a [`Message`] into the bytes that will follow a frame header.
///
/// An injected collaborator in the same role as the source's
/// `pack_from_data_f`: the fetcher and peer transport never need to know how
/// any particular message is laid out on the wire.
pub trait MessageEncoder: Send + Sync {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, PeerError>;
}

/// Parses a message's payload bytes given its command name.
///
/// An injected collaborator in the same role as the source's
/// `parse_from_data_f`.
pub trait MessageDecoder: Send + Sync {
    fn decode(&self, command: Command, payload: &[u8]) -> Result<Message, PeerError>;
}

/// The concrete Bitcoin wire encoding, parameterized by network and protocol version.
#[derive(Clone, Copy, Debug)]
pub struct BitcoinCodec {
    network: Network,
    version: ProtocolVersion,
}

impl BitcoinCodec {
    pub fn new(network: Network, version: ProtocolVersion) -> Self {
        BitcoinCodec { network, version }
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

impl MessageEncoder for BitcoinCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, PeerError> {
        let mut body = Vec::new();
        write_body(message, &mut body)?;
        Ok(body)
    }
}

impl MessageDecoder for BitcoinCodec {
    fn decode(&self, command: Command, payload: &[u8]) -> Result<Message, PeerError> {
        let mut reader = Cursor::new(payload);
        let msg = match command {
            Command::Version => Message::Version(Version::bitcoin_deserialize(&mut reader)?),
            Command::Verack => Message::Verack,
            Command::Ping => Message::Ping(Nonce::bitcoin_deserialize(&mut reader)?),
            Command::Pong => Message::Pong(Nonce::bitcoin_deserialize(&mut reader)?),
            Command::GetData => {
                Message::GetData(<Vec<InventoryHash>>::bitcoin_deserialize(&mut reader)?)
            }
            Command::Inv => Message::Inv(<Vec<InventoryHash>>::bitcoin_deserialize(&mut reader)?),
            Command::Block => {
                // `Block` parses from a `BytesMut` (it needs `split_to` to
                // separate header from body), not the generic `io::Read`
                // every other message decodes from.
                let mut buf = bytes::BytesMut::from(payload);
                let (block, _hash) = block::Block::deserialize_from_buf(&mut buf)?;
                Message::Block(std::sync::Arc::new(block))
            }
            Command::NotFound => {
                Message::NotFound(<Vec<InventoryHash>>::bitcoin_deserialize(&mut reader)?)
            }
            Command::Reject => Message::Reject {
                message: String::bitcoin_deserialize(&mut reader)?,
                ccode: match reader.read_u8()? {
                    0x01 => RejectReason::Malformed,
                    0x10 => RejectReason::Invalid,
                    0x11 => RejectReason::Obsolete,
                    0x12 => RejectReason::Duplicate,
                    0x40 => RejectReason::Nonstandard,
                    0x41 => RejectReason::Dust,
                    0x42 => RejectReason::InsufficientFee,
                    0x43 => RejectReason::Checkpoint,
                    0x50 => RejectReason::Other,
                    _ => {
                        return Err(PeerError::Serialization(
                            btc_chain::SerializationError::Parse("invalid reject ccode"),
                        ))
                    }
                },
                reason: String::bitcoin_deserialize(&mut reader)?,
                data: <[u8; 32]>::bitcoin_deserialize(&mut reader).ok(),
            },
        };
        Ok(msg)
    }
}

fn write_body<W: Write>(msg: &Message, mut writer: W) -> Result<(), PeerError> {
    match msg {
        Message::Version(inner) => inner.bitcoin_serialize(&mut writer)?,
        Message::Verack => {}
        Message::Ping(nonce) => nonce.bitcoin_serialize(&mut writer)?,
        Message::Pong(nonce) => nonce.bitcoin_serialize(&mut writer)?,
        Message::GetData(hashes) => hashes.bitcoin_serialize(&mut writer)?,
        Message::Inv(hashes) => hashes.bitcoin_serialize(&mut writer)?,
        Message::Block(block) => block.bitcoin_serialize(&mut writer)?,
        Message::NotFound(hashes) => hashes.bitcoin_serialize(&mut writer)?,
        Message::Reject {
            message,
            ccode,
            reason,
            data,
        } => {
            message.bitcoin_serialize(&mut writer)?;
            writer.write_u8(*ccode as u8)?;
            reason.bitcoin_serialize(&mut writer)?;
            if let Some(data) = data {
                writer.write_all(data)?;
            }
        }
    }
    Ok(())
}

/// Assembles a complete frame (header + body) for `message`, ready to be
/// written to a peer's stream in one call.
pub fn encode_frame(
    codec: &dyn MessageEncoder,
    network: Network,
    message: &Message,
) -> Result<Vec<u8>, PeerError> {
    let body = codec.encode(message)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.write_all(&Magic::from(network).0)?;
    frame.write_all(message.command().bytes())?;
    frame.write_u32::<LittleEndian>(body.len() as u32)?;
    frame.write_all(&sha256d::Checksum::from(&body[..]).0)?;
    frame.write_all(&body)?;
    Ok(frame)
}

/// A parsed, but not yet validated, frame header.
pub struct FrameHeader {
    pub magic: Magic,
    pub command: Command,
    pub body_len: usize,
    pub checksum: sha256d::Checksum,
}

impl FrameHeader {
    /// Parses the 24 bytes of a frame header.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<FrameHeader, PeerError> {
        let mut reader = Cursor::new(&bytes[..]);
        let magic = Magic(<[u8; 4]>::bitcoin_deserialize(&mut reader)?);
        let command = Command::bitcoin_deserialize(&mut reader)?;
        let body_len = reader.read_u32::<LittleEndian>()? as usize;
        let checksum = sha256d::Checksum(<[u8; 4]>::bitcoin_deserialize(&mut reader)?);
        Ok(FrameHeader {
            magic,
            command,
            body_len,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use super::*;
    use crate::constants::CURRENT_VERSION;

    fn codec() -> BitcoinCodec {
        BitcoinCodec::new(Network::Mainnet, CURRENT_VERSION)
    }

    #[test]
    fn version_message_round_trips_through_a_frame() {
        let services = super::super::types::PeerServices::NODE_NETWORK;
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 6)), 8333);
        let message = Message::Version(Version::new(
            CURRENT_VERSION,
            addr,
            services,
            services,
            addr,
            Nonce(0x9082_4908_8927_9238),
            "btc-network".to_owned(),
            block::Height(540_000),
            true,
        ));

        let frame = encode_frame(&codec(), Network::Mainnet, &message).expect("encodes");
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..HEADER_LEN]);
        let header = FrameHeader::parse(&header_bytes).expect("parses header");
        assert_eq!(header.command, Command::Version);
        assert_eq!(header.body_len, frame.len() - HEADER_LEN);

        let payload = &frame[HEADER_LEN..];
        assert_eq!(header.checksum, sha256d::Checksum::from(payload));

        let decoded = codec().decode(header.command, payload).expect("decodes");
        assert_eq!(decoded, message);
    }

    #[test]
    fn ping_pong_round_trip() {
        for message in [Message::Ping(Nonce(7)), Message::Pong(Nonce(7)), Message::Verack] {
            let frame = encode_frame(&codec(), Network::Mainnet, &message).expect("encodes");
            let mut header_bytes = [0u8; HEADER_LEN];
            header_bytes.copy_from_slice(&frame[..HEADER_LEN]);
            let header = FrameHeader::parse(&header_bytes).expect("parses header");
            let decoded = codec()
                .decode(header.command, &frame[HEADER_LEN..])
                .expect("decodes");
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn magic_differs_between_networks() {
        let message = Message::Verack;
        let mainnet = encode_frame(&codec(), Network::Mainnet, &message).unwrap();
        let testnet = encode_frame(&codec(), Network::Testnet, &message).unwrap();
        assert_ne!(&mainnet[..4], &testnet[..4]);
    }

    #[test]
    fn reject_without_data_round_trips() {
        let message = Message::Reject {
            message: "block".to_owned(),
            ccode: RejectReason::Invalid,
            reason: "bad-proof-of-work".to_owned(),
            data: None,
        };
        let frame = encode_frame(&codec(), Network::Mainnet, &message).expect("encodes");
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..HEADER_LEN]);
        let header = FrameHeader::parse(&header_bytes).expect("parses header");
        let decoded = codec()
            .decode(header.command, &frame[HEADER_LEN..])
            .expect("decodes");
        assert_eq!(decoded, message);
    }

    fn frame_round_trip(message: &Message) -> Message {
        let frame = encode_frame(&codec(), Network::Mainnet, message).expect("encodes");
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..HEADER_LEN]);
        let header = FrameHeader::parse(&header_bytes).expect("parses header");
        assert_eq!(header.checksum, sha256d::Checksum::from(&frame[HEADER_LEN..]));
        codec()
            .decode(header.command, &frame[HEADER_LEN..])
            .expect("decodes")
    }

    proptest::proptest! {
        #[test]
        fn ping_round_trips(nonce: Nonce) {
            let decoded = frame_round_trip(&Message::Ping(nonce));
            proptest::prop_assert_eq!(decoded, Message::Ping(nonce));
        }

        #[test]
        fn pong_round_trips(nonce: Nonce) {
            let decoded = frame_round_trip(&Message::Pong(nonce));
            proptest::prop_assert_eq!(decoded, Message::Pong(nonce));
        }

        #[test]
        fn getdata_round_trips(hashes: Vec<InventoryHash>) {
            let decoded = frame_round_trip(&Message::GetData(hashes.clone()));
            proptest::prop_assert_eq!(decoded, Message::GetData(hashes));
        }

        #[test]
        fn inv_round_trips(hashes: Vec<InventoryHash>) {
            let decoded = frame_round_trip(&Message::Inv(hashes.clone()));
            proptest::prop_assert_eq!(decoded, Message::Inv(hashes));
        }

        #[test]
        fn block_round_trips(header: block::Header, transactions in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let block = std::sync::Arc::new(block::Block {
                header,
                transaction_count: 0,
                raw_transactions: transactions,
            });
            let decoded = frame_round_trip(&Message::Block(block.clone()));
            match decoded {
                Message::Block(other) => {
                    proptest::prop_assert_eq!(block.header, other.header);
                    proptest::prop_assert_eq!(&block.raw_transactions, &other.raw_transactions);
                }
                _ => proptest::prop_assert!(false, "expected a Block message"),
            }
        }
    }
}
