//! Runtime configuration for the peer transport and block fetcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use btc_chain::parameters::Network;

use crate::constants::{
    INITIAL_BATCH_SIZE, MAX_BATCH_SIZE, MAX_BATCH_TIME, MAX_PROTOCOL_MESSAGE_LEN, TARGET_BATCH_TIME,
};
use crate::peer::{Peer, PeerId};
use crate::protocol::external::codec::{MessageDecoder, MessageEncoder};

/// Configuration for connecting to peers and scheduling block fetches.
///
/// Typically loaded from a TOML file, the same shape whether it arrives from
/// disk, an environment-backed overlay, or test fixtures; nothing here
/// depends on a particular loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The Bitcoin network to connect to.
    pub network: Network,

    /// The largest message payload this node will accept from a peer.
    pub max_message_length: usize,

    /// The batch size a newly added peer's fetcher loop starts at.
    pub initial_batch_size: usize,

    /// The largest batch a fetcher loop will ever claim at once.
    pub max_batch_size: usize,

    /// The batch duration a fetcher loop targets when sizing its next batch.
    #[serde(with = "humantime_duration")]
    pub target_batch_time: Duration,

    /// The maximum time a fetcher loop waits for a batch to complete before
    /// requeueing whatever is still outstanding.
    #[serde(with = "humantime_duration")]
    pub max_batch_time: Duration,
}

impl Config {
    /// Builds a [`Peer`] bound to `stream`, honoring this config's
    /// `max_message_length` instead of the transport's built-in default.
    ///
    /// Establishing the underlying connection (dialing out or accepting an
    /// inbound socket) is the caller's responsibility; this just wires the
    /// resulting stream up with this config's network and message-size cap
    /// before handing it to [`Fetcher::add_peer`](crate::Fetcher::add_peer).
    pub fn build_peer<C, S>(&self, id: PeerId, stream: S, codec: C) -> Peer<C>
    where
        C: MessageEncoder + MessageDecoder + Send + Sync + 'static,
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        Peer::with_max_message_length(id, stream, self.network, codec, self.max_message_length)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: Network::Mainnet,
            max_message_length: MAX_PROTOCOL_MESSAGE_LEN,
            initial_batch_size: INITIAL_BATCH_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            target_batch_time: TARGET_BATCH_TIME,
            max_batch_time: MAX_BATCH_TIME,
        }
    }
}

/// Serializes a [`Duration`] as a number of whole seconds, so config files
/// can write `target_batch_time = 3` instead of a nested struct.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_constants() {
        let config = Config::default();
        assert_eq!(config.max_batch_size, MAX_BATCH_SIZE);
        assert_eq!(config.initial_batch_size, INITIAL_BATCH_SIZE);
        assert_eq!(config.target_batch_time, TARGET_BATCH_TIME);
        assert_eq!(config.max_batch_time, MAX_BATCH_TIME);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).expect("serializable");
        let parsed: Config = toml::from_str(&text).expect("parseable");
        assert_eq!(parsed.max_message_length, config.max_message_length);
    }

    #[tokio::test]
    async fn build_peer_honors_max_message_length() {
        use crate::protocol::external::codec::BitcoinCodec;
        use crate::protocol::external::types::Nonce;
        use crate::protocol::external::Message;

        let (ours, _theirs) = tokio::io::duplex(1024);
        let mut config = Config::default();
        config.max_message_length = 4;

        let codec = BitcoinCodec::new(config.network, crate::constants::CURRENT_VERSION);
        let peer = config.build_peer(
            std::net::SocketAddr::from(([127, 0, 0, 1], 8333)),
            ours,
            codec,
        );

        // A ping's 8-byte nonce payload exceeds the 4-byte cap we configured.
        let err = peer
            .send_message(&Message::Ping(Nonce(1)))
            .expect_err("payload should be rejected under the configured cap");
        assert!(matches!(err, crate::error::PeerError::MessageTooLarge(_, 4)));
    }
}
