//! extalife-core: Core types, errors, and events for the Exta Life client.
//!
//! This crate defines the protocol-agnostic building blocks shared by the
//! transport/client crate and by applications consuming the library:
//!
//! - [`WireRequest`] / [`WireMessage`] -- the EFC-01 JSON wire frames
//! - [`Command`] / [`Action`] -- command codes and the action vocabulary
//! - [`ChannelRecord`] -- the flattened per-channel data model
//! - [`ListenerEvent`] -- asynchronous notification-stream events
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod types;

// Re-export key types at crate root for ergonomic `use extalife_core::*`.
pub use error::{Error, Result};
pub use events::ListenerEvent;
pub use types::{
    Action, ChannelRecord, Command, ETX, Status, WireMessage, WireRequest, parse_channel_id,
};
