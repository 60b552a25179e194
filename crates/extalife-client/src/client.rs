//! High-level Exta Life controller client.
//!
//! [`ExtaLifeClient`] wraps a single command [`Connection`] behind an async
//! mutex, so every command exchange owns the socket for its full
//! drain/send/collect cycle. Concurrent callers queue on the lock; a caller
//! that cannot acquire it within the lock timeout gets [`Error::Busy`]
//! instead of waiting forever behind a stuck exchange.
//!
//! The fetch/control surface mirrors the controller's command set: a busy
//! or failed exchange is logged and surfaces as `None`, letting polling
//! integrations skip a cycle instead of tearing down.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

use extalife_core::error::{Error, Result};
use extalife_core::events::ListenerEvent;
use extalife_core::types::{parse_channel_id, Action, ChannelRecord, Command, WireMessage};

use crate::channels::build_channel_records;
use crate::connection::{Connection, COMMAND_PORT, DEFAULT_EXEC_CEILING};
use crate::discovery::{self, DISCOVERY_TIMEOUT};
use crate::listener::{ListenerOptions, NotificationListener};

/// Default wait for the command-connection lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-command poll slice for receiver fetches, which return the most data.
const FETCH_RECEIVERS_POLL: Duration = Duration::from_millis(1500);

/// Per-command poll slice for sensor and Exta Free fetches.
const FETCH_OTHERS_POLL: Duration = Duration::from_millis(1000);

/// Per-command poll slice for control, version and restart exchanges.
const CONTROL_POLL: Duration = Duration::from_millis(200);

/// Connection options for [`ExtaLifeClient::connect`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Controller IP or hostname. `None` triggers UDP autodiscovery.
    pub host: Option<String>,
    /// Controller user name.
    pub user: String,
    /// Controller password.
    pub password: String,
    /// Command port, normally 20400.
    pub port: u16,
    /// Bounded wait for one autodiscovery announcement.
    pub discovery_timeout: Duration,
    /// Hard ceiling on one command exchange.
    pub exec_ceiling: Duration,
    /// Bounded wait for the command-connection lock.
    pub lock_timeout: Duration,
}

impl ClientOptions {
    /// Options with the standard port and timeouts, host via autodiscovery.
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            host: None,
            user: user.to_string(),
            password: password.to_string(),
            port: COMMAND_PORT,
            discovery_timeout: DISCOVERY_TIMEOUT,
            exec_ceiling: DEFAULT_EXEC_CEILING,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Use a known controller address instead of autodiscovery.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }
}

/// Connected, logged-in client for one EFC-01 controller.
pub struct ExtaLifeClient {
    conn: Arc<Mutex<Connection>>,
    host: String,
    port: u16,
    user: String,
    password: String,
    lock_timeout: Duration,
}

impl ExtaLifeClient {
    /// Resolve the controller address, open the command connection and log in.
    ///
    /// When no host is configured the controller is located via UDP
    /// multicast autodiscovery first. A rejected login is reported as
    /// [`Error::Connection`] carrying the controller's response.
    pub async fn connect(options: ClientOptions) -> Result<Self> {
        let host = match options.host {
            Some(host) => host,
            None => discovery::discover(options.discovery_timeout)
                .await
                .map(|ip| ip.to_string())
                .ok_or_else(|| {
                    Error::Connection("could not find controller via autodiscovery".to_string())
                })?,
        };

        let (conn, resp) = Connection::connect(
            &host,
            options.port,
            &options.user,
            &options.password,
            options.exec_ceiling,
        )
        .await?;
        if !Connection::login_ok(&resp) {
            return Err(Error::Connection(format!("login rejected: {:?}", resp)));
        }

        tracing::info!(host = %host, port = options.port, "Logged in to controller");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            host,
            port: options.port,
            user: options.user,
            password: options.password,
            lock_timeout: options.lock_timeout,
        })
    }

    /// The controller address this client is connected to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Firmware version advertised by the controller, if it answers.
    pub async fn get_version(&self) -> Option<String> {
        let resp = match self.exec(Command::Version, None, CONTROL_POLL).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "Version command could not be executed");
                return None;
            }
        };

        let version = resp
            .first()
            .and_then(|m| m.data.as_ref())
            .and_then(|d| d.get("new_version"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if version.is_none() {
            tracing::error!(messages = resp.len(), "Version response carried no version field");
        }
        version
    }

    /// Fetch all channels known to the controller.
    ///
    /// Runs the receiver, sensor and Exta Free fetches in that order and
    /// flattens the responses into one record per channel. Any failing
    /// fetch aborts the cycle and yields `None`; a successful cycle with
    /// nothing configured yields an empty list.
    pub async fn get_channels(&self) -> Option<Vec<ChannelRecord>> {
        let mut channels = Vec::new();

        for (command, poll) in [
            (Command::FetchReceivers, FETCH_RECEIVERS_POLL),
            (Command::FetchSensors, FETCH_OTHERS_POLL),
            (Command::FetchExtaFree, FETCH_OTHERS_POLL),
        ] {
            match self.exec(command, None, poll).await {
                Ok(resp) => channels.extend(build_channel_records(&resp)),
                Err(e) => {
                    tracing::error!(
                        command = command.code(),
                        error = %e,
                        "Fetch command could not be executed"
                    );
                    return None;
                }
            }
        }

        tracing::debug!(channels = channels.len(), "Channel fetch complete");
        Some(channels)
    }

    /// Send a control command for one channel.
    ///
    /// `channel_id` is the `"<deviceId>-<channelNumber>"` form produced by
    /// [`get_channels`](ExtaLifeClient::get_channels). The action maps to
    /// the wire-level `state` code (set-value actions send `state: null`);
    /// `fields` carries the action's extra parameters, e.g. `value` for
    /// `SET_POSITION`, and is overlaid on top of the generated payload.
    pub async fn execute_action(
        &self,
        action: Action,
        channel_id: &str,
        fields: Map<String, Value>,
    ) -> Option<Vec<WireMessage>> {
        let (device, channel) = match parse_channel_id(channel_id) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(action = %action, channel_id, error = %e, "Invalid channel id");
                return None;
            }
        };

        let mut data = Map::new();
        data.insert("id".to_string(), Value::from(device));
        data.insert("channel".to_string(), Value::from(channel));
        data.insert(
            "state".to_string(),
            action.state_code().map_or(Value::Null, Value::from),
        );
        for (key, value) in fields {
            data.insert(key, value);
        }

        match self
            .exec(Command::ControlDevice, Some(Value::Object(data)), CONTROL_POLL)
            .await
        {
            Ok(resp) => {
                tracing::debug!(action = %action, channel_id, messages = resp.len(), "Action executed");
                Some(resp)
            }
            Err(e) => {
                tracing::error!(action = %action, channel_id, error = %e, "Action could not be executed");
                None
            }
        }
    }

    /// Ask the controller to restart itself.
    pub async fn restart(&self) -> Option<Vec<WireMessage>> {
        match self
            .exec(Command::Restart, Some(Value::Object(Map::new())), CONTROL_POLL)
            .await
        {
            Ok(resp) => Some(resp),
            Err(e) => {
                tracing::error!(error = %e, "Restart command could not be executed");
                None
            }
        }
    }

    /// Send a keep-alive frame, reconnecting once if the socket is dead.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.lock().await?;
        conn.ping().await
    }

    /// Start a notification listener against this controller.
    ///
    /// The listener opens its own connection with the stored credentials;
    /// command traffic and push traffic never share a socket.
    pub async fn start_listener(
        &self,
        options: ListenerOptions,
    ) -> Result<(NotificationListener, mpsc::Receiver<ListenerEvent>)> {
        NotificationListener::start(&self.host, self.port, &self.user, &self.password, options)
            .await
    }

    /// Run one command exchange while holding the connection lock.
    async fn exec(
        &self,
        command: Command,
        data: Option<Value>,
        poll_timeout: Duration,
    ) -> Result<Vec<WireMessage>> {
        let mut conn = self.lock().await?;
        conn.exec_command(command.code(), data, poll_timeout).await
    }

    async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, Connection>> {
        tokio::time::timeout(self.lock_timeout, self.conn.lock())
            .await
            .map_err(|_| Error::Busy)
    }
}
