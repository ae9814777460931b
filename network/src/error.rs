//! Error types for peer transport and block fetching.

use btc_chain::SerializationError;
use thiserror::Error;

/// An error encountered while framing or unframing messages on a peer's byte stream.
///
/// Every variant except [`PeerError::Io`] with an [`std::io::ErrorKind::UnexpectedEof`]
/// kind is fatal for that peer's connection: the fetcher loop bound to this
/// peer logs the error and exits without propagating it anywhere else.
#[derive(Error, Debug)]
pub enum PeerError {
    /// The four magic bytes at the start of a frame did not match the
    /// configured network.
    #[error("bad magic bytes in frame header")]
    BadMagic,

    /// The frame declared a payload longer than the configured maximum.
    #[error("message payload length {0} exceeds the maximum of {1}")]
    MessageTooLarge(usize, usize),

    /// The computed double-SHA256 checksum of the payload did not match the
    /// checksum carried in the header.
    #[error("checksum mismatch in frame payload")]
    BadChecksum,

    /// The peer's stream closed while a read was in progress.
    #[error("peer connection closed")]
    UnexpectedEof,

    /// Any other I/O failure on the underlying stream.
    #[error("peer i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A message's payload could not be parsed into its in-memory representation.
    #[error("message serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

/// An error encountered while scheduling block fetches.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Sending a `getdata` for a claimed batch failed; the batch is requeued.
    #[error("send failed for a claimed batch, requests were requeued: {0}")]
    SendFailure(#[source] PeerError),
}
