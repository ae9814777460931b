//! A framed transport over one peer's TCP byte stream.
//!
//! A [`Peer`] owns a single ordered byte stream in each direction. Sending is
//! fire-and-forget: messages are handed to a dedicated writer task over an
//! unbounded channel, so the caller never suspends on a send. Receiving
//! suspends until a complete, checksum-validated frame is available, reading
//! under a mutex so two concurrent receivers can never interleave and
//! desynchronize the frame boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use btc_chain::parameters::Network;

use crate::constants::{HEADER_LEN, MAX_PROTOCOL_MESSAGE_LEN};
use crate::error::PeerError;
use crate::protocol::external::codec::{encode_frame, FrameHeader, MessageDecoder, MessageEncoder};
use crate::protocol::external::{Command, Message};

/// Identifies a peer for logging, metrics, and the fetcher's `peers_tried` set.
pub type PeerId = std::net::SocketAddr;

/// A framed transport bound to one peer connection.
pub struct Peer<C> {
    id: PeerId,
    network: Network,
    codec: Arc<C>,
    max_msg_size: usize,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: Mutex<Box<dyn tokio::io::AsyncRead + Send + Unpin>>,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl<C> Peer<C>
where
    C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
{
    /// Splits `stream` into a reader and a writer task, and returns a `Peer`
    /// bound to `id`. The writer task lives as long as the returned `Peer`
    /// (or any clone of its sender) does.
    pub fn new<S>(id: PeerId, stream: S, network: Network, codec: C) -> Peer<C>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        Peer::with_max_message_length(id, stream, network, codec, MAX_PROTOCOL_MESSAGE_LEN)
    }

    /// Like [`Peer::new`], but honors a caller-supplied message size cap
    /// (typically `Config::max_message_length`) instead of the default.
    pub fn with_max_message_length<S>(
        id: PeerId,
        stream: S,
        network: Network,
        codec: C,
        max_msg_size: usize,
    ) -> Peer<C>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(error) = write_half.write_all(&frame).await {
                    trace!(?error, "peer writer task exiting after write failure");
                    break;
                }
            }
        });

        Peer {
            id,
            network,
            codec: Arc::new(codec),
            max_msg_size,
            outbound: tx,
            reader: Mutex::new(Box::new(read_half)),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Serializes and queues `message` for sending. Returns as soon as the
    /// frame has been encoded and handed to the writer task; does not wait
    /// for the bytes to reach the OS, let alone the peer.
    pub fn send_message(&self, message: &Message) -> Result<(), PeerError> {
        let frame = encode_frame(self.codec.as_ref(), self.network, message)?;
        if frame.len() > HEADER_LEN + self.max_msg_size {
            return Err(PeerError::MessageTooLarge(
                frame.len() - HEADER_LEN,
                self.max_msg_size,
            ));
        }
        self.bytes_written
            .fetch_add(frame.len() as u64, Ordering::Relaxed);
        self.outbound
            .send(frame)
            .map_err(|_| PeerError::UnexpectedEof)
    }

    /// Suspends until a complete, checksum-validated frame has arrived, and
    /// returns its parsed [`Message`].
    pub async fn receive(&self) -> Result<Message, PeerError> {
        let (command, payload) = self.receive_raw().await?;
        self.codec.decode(command, &payload)
    }

    /// Like [`Peer::receive`], but returns the raw, undecoded payload bytes
    /// alongside the command name.
    pub async fn receive_raw(&self) -> Result<(Command, Vec<u8>), PeerError> {
        let mut reader = self.reader.lock().await;

        let mut header_bytes = [0u8; HEADER_LEN];
        read_exact_or_eof(&mut *reader, &mut header_bytes).await?;
        let header = FrameHeader::parse(&header_bytes)?;

        if header.magic != crate::protocol::external::types::Magic::from(self.network) {
            return Err(PeerError::BadMagic);
        }
        if header.body_len > self.max_msg_size {
            return Err(PeerError::MessageTooLarge(header.body_len, self.max_msg_size));
        }

        let mut payload = vec![0u8; header.body_len];
        read_exact_or_eof(&mut *reader, &mut payload).await?;

        // Release the read lock before hashing; the checksum check doesn't
        // need to serialize against other receivers.
        drop(reader);

        self.bytes_read.fetch_add(
            (HEADER_LEN + header.body_len) as u64,
            Ordering::Relaxed,
        );

        let actual = btc_chain::serialization::sha256d::Checksum::from(&payload[..]);
        if actual != header.checksum {
            return Err(PeerError::BadChecksum);
        }

        trace!(peer = %self.id, command = ?header.command, body_len = header.body_len, "received frame");
        Ok((header.command, payload))
    }
}

async fn read_exact_or_eof<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), PeerError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(PeerError::UnexpectedEof)
        }
        Err(error) => Err(PeerError::Io(error)),
    }
}
