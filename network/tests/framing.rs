//! Integration tests for the peer transport's framing contract.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::io::{AsyncWriteExt, DuplexStream};

use btc_chain::parameters::Network;
use btc_network::constants::{CURRENT_VERSION, HEADER_LEN, MAX_PROTOCOL_MESSAGE_LEN};
use btc_network::error::PeerError;
use btc_network::protocol::external::codec::{encode_frame, BitcoinCodec};
use btc_network::protocol::external::types::Nonce;
use btc_network::protocol::external::Message;
use btc_network::peer::Peer;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
}

fn peer_pair(port: u16) -> (Peer<BitcoinCodec>, DuplexStream) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let codec = BitcoinCodec::new(Network::Mainnet, CURRENT_VERSION);
    (Peer::new(addr(port), ours, Network::Mainnet, codec), theirs)
}

#[tokio::test]
async fn receives_a_well_formed_frame() {
    let (peer, mut theirs) = peer_pair(1);
    let codec = BitcoinCodec::new(Network::Mainnet, CURRENT_VERSION);
    let frame = encode_frame(&codec, Network::Mainnet, &Message::Verack).unwrap();
    theirs.write_all(&frame).await.unwrap();

    let message = peer.receive().await.expect("should decode");
    assert_eq!(message, Message::Verack);
    assert_eq!(peer.bytes_read(), frame.len() as u64);
}

#[tokio::test]
async fn tampered_payload_fails_bad_checksum() {
    let (peer, mut theirs) = peer_pair(2);
    let codec = BitcoinCodec::new(Network::Mainnet, CURRENT_VERSION);
    let mut frame = encode_frame(&codec, Network::Mainnet, &Message::Ping(Nonce(42)))
        .unwrap();
    // Ping's payload is a single 8-byte nonce just past the 24-byte header;
    // flip one bit of it without touching the checksum.
    let payload_index = HEADER_LEN;
    frame[payload_index] ^= 0x01;
    theirs.write_all(&frame).await.unwrap();

    let error = peer.receive().await.unwrap_err();
    assert!(matches!(error, PeerError::BadChecksum));
}

#[tokio::test]
async fn oversized_declared_length_fails_before_reading_the_payload() {
    let (peer, mut theirs) = peer_pair(3);

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&[0xF9, 0xBE, 0xB4, 0xD9]); // mainnet magic
    header.extend_from_slice(b"ping\0\0\0\0\0\0\0\0");
    header.extend_from_slice(&((MAX_PROTOCOL_MESSAGE_LEN as u32) + 1).to_le_bytes());
    header.extend_from_slice(&[0u8; 4]); // checksum, irrelevant here
    theirs.write_all(&header).await.unwrap();

    let error = peer.receive().await.unwrap_err();
    assert!(matches!(error, PeerError::MessageTooLarge(_, _)));
}

#[tokio::test]
async fn wrong_magic_is_rejected() {
    let (peer, mut theirs) = peer_pair(4);
    let testnet_codec = BitcoinCodec::new(Network::Testnet, CURRENT_VERSION);
    let frame = encode_frame(&testnet_codec, Network::Testnet, &Message::Verack).unwrap();
    theirs.write_all(&frame).await.unwrap();

    let error = peer.receive().await.unwrap_err();
    assert!(matches!(error, PeerError::BadMagic));
}

#[tokio::test]
async fn disconnect_mid_read_is_unexpected_eof() {
    let (peer, theirs) = peer_pair(5);
    drop(theirs);

    let error = peer.receive().await.unwrap_err();
    assert!(matches!(error, PeerError::UnexpectedEof));
}
