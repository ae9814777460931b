/// A single byte enum representing a Bitcoin message type.
pub mod command;
/// Encoding and decoding of messages to and from wire frames.
pub mod codec;
/// Inventory items.
pub mod inv;
/// An enum of all supported Bitcoin message types.
pub mod message;
/// Newtype wrappers for primitive types.
pub mod types;

pub use command::Command;
pub use inv::InventoryHash;
pub use message::{Message, Version};
