//! Protocol- and scheduler-level constants.

use std::time::Duration;

use crate::protocol::external::types::ProtocolVersion;

/// The length of a Bitcoin message header: `magic(4) || command(12) ||
/// payload_len(4) || checksum(4)`.
pub const HEADER_LEN: usize = 24;

/// The default maximum size of a protocol message payload.
pub const MAX_PROTOCOL_MESSAGE_LEN: usize = 2 * 1024 * 1024;

/// The protocol version this implementation speaks.
pub const CURRENT_VERSION: ProtocolVersion = ProtocolVersion(70_015);

/// The inventory type code for a block.
pub const ITEM_TYPE_BLOCK: u32 = 2;

/// The batch duration a per-peer fetcher loop targets when sizing its next batch.
pub const TARGET_BATCH_TIME: Duration = Duration::from_secs(3);

/// The maximum time a fetcher loop will wait for a batch to complete before
/// requeueing whatever is still outstanding.
pub const MAX_BATCH_TIME: Duration = Duration::from_secs(6);

/// The largest batch a fetcher loop will ever claim at once.
pub const MAX_BATCH_SIZE: usize = 500;

/// The batch size a newly added peer starts at.
pub const INITIAL_BATCH_SIZE: usize = 10;
