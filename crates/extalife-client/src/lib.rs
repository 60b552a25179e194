//! extalife-client: Protocol engine for the Exta Life EFC-01 controller.
//!
//! The controller speaks newline-free JSON frames terminated by an ETX
//! byte (0x03) over TCP port 20400. This crate implements the full client
//! side of that protocol:
//!
//! - [`codec`]: frame encoding and incremental decoding
//! - [`discovery`]: UDP multicast autodiscovery of the controller
//! - [`connection`]: one logged-in TCP session with command exchange,
//!   keep-alive ping and push reads
//! - [`client`]: the high-level [`ExtaLifeClient`] with a serialized
//!   command connection
//! - [`listener`]: the background notification listener on its own
//!   connection
//! - [`channels`]: flattening fetch responses into per-channel records
//! - [`state`]: the last-known channel state cache with change detection

pub mod channels;
pub mod client;
pub mod codec;
pub mod connection;
pub mod discovery;
pub mod listener;
pub mod state;

pub use channels::build_channel_records;
pub use client::{ClientOptions, ExtaLifeClient};
pub use connection::{Connection, COMMAND_PORT};
pub use listener::{ListenerOptions, NotificationListener};
pub use state::ChannelStateCache;
