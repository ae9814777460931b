//! The external Bitcoin wire protocol: message types and framing.

pub mod external;
