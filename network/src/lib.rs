//! A Bitcoin P2P client focused on parallel block retrieval from a pool of
//! peers: a framed message transport ([`peer`]) and a scheduler that spreads
//! prioritized block requests across however many peers are connected
//! ([`fetcher`]).

pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod peer;
pub mod protocol;

pub use config::Config;
pub use error::{FetchError, PeerError};
pub use fetcher::{Delivery, Fetcher};
pub use peer::{Peer, PeerId};
