//! # extalife -- Async Exta Life EFC-01 Controller Client
//!
//! `extalife` is an asynchronous Rust client for the Zamel Exta Life EFC-01
//! home-automation controller. It speaks the controller's native TCP
//! protocol (JSON frames terminated by an ETX byte on port 20400), locates
//! controllers on the LAN via UDP multicast, and delivers push
//! notifications over a dedicated second connection. It is designed for
//! home-automation bridges and integrations that poll device state and
//! drive switches, dimmers, blinds and thermostats.
//!
//! ## Quick Start
//!
//! Add `extalife` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! extalife = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect (autodiscovering the controller) and list all channels:
//!
//! ```no_run
//! use extalife::{ClientOptions, ExtaLifeClient};
//!
//! #[tokio::main]
//! async fn main() -> extalife::Result<()> {
//!     let client = ExtaLifeClient::connect(ClientOptions::new("user", "password")).await?;
//!
//!     println!("controller: {}", client.host());
//!     if let Some(version) = client.get_version().await {
//!         println!("firmware:   {}", version);
//!     }
//!
//!     for channel in client.get_channels().await.unwrap_or_default() {
//!         println!("{}: {:?}", channel.id, channel.data.get("alias"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Drive a device by channel id:
//!
//! ```no_run
//! use extalife::{Action, ExtaLifeClient};
//! use serde_json::Map;
//!
//! # async fn example(client: &ExtaLifeClient) {
//! client.execute_action(Action::TurnOn, "11-1", Map::new()).await;
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                   | Purpose                                      |
//! |-------------------------|----------------------------------------------|
//! | `extalife-core`         | Types, actions, errors, listener events      |
//! | `extalife-client`       | Framing, discovery, connections, listener    |
//! | `extalife-test-harness` | Scriptable mock controller for tests         |
//! | **`extalife`**          | This facade crate -- re-exports everything   |
//!
//! ## Two Connections
//!
//! The controller pushes state changes to every connected session. To keep
//! pushes from racing command responses, the client uses two independently
//! logged-in TCP connections: [`ExtaLifeClient`] serializes command
//! exchanges on one, and
//! [`NotificationListener`] spends its life reading pushes on the other,
//! forwarding them as [`ListenerEvent`]s:
//!
//! ```no_run
//! use extalife::{ExtaLifeClient, ListenerEvent, ListenerOptions};
//!
//! # async fn example(client: &ExtaLifeClient) -> extalife::Result<()> {
//! let (listener, mut events) = client.start_listener(ListenerOptions::default()).await?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ListenerEvent::Notification(msg) => println!("{:?}", msg.data),
//!         ListenerEvent::Silence => client.ping().await?,
//!         other => println!("{:?}", other),
//!     }
//! }
//! listener.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## State Tracking
//!
//! [`ChannelStateCache`] keeps the last-known field set per channel and
//! reports whether an update (from a fetch or a push) actually changed
//! anything, so integrations emit change events only on real deltas.

pub use extalife_core::error::{Error, Result};
pub use extalife_core::events::ListenerEvent;
pub use extalife_core::types::{
    parse_channel_id, Action, ChannelRecord, Command, Status, WireMessage, WireRequest, ETX,
};

pub use extalife_client::channels::build_channel_records;
pub use extalife_client::client::{ClientOptions, ExtaLifeClient};
pub use extalife_client::connection::{Connection, COMMAND_PORT};
pub use extalife_client::listener::{ListenerOptions, NotificationListener};
pub use extalife_client::state::ChannelStateCache;

/// Controller autodiscovery over UDP multicast.
pub mod discovery {
    pub use extalife_client::discovery::*;
}
