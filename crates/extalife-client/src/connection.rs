//! One TCP connection to the EFC-01 controller.
//!
//! [`Connection`] owns a single socket to the controller command port and
//! implements the shared-connection protocol discipline: drain stale bytes
//! before every send, accumulate fragmented responses through the
//! [`FrameDecoder`], filter cross-talk from other sessions, and stop on a
//! terminal (`success`/`failure`) status or a hard response ceiling.
//!
//! The same type backs both the command client (request/response) and the
//! notification listener (push reads via [`read_push`](Connection::read_push));
//! each holds its own independent `Connection` with a separate login.
//!
//! Responses to a command are only ever read by the task that sent it --
//! callers must serialize command execution (the command client does this
//! with its single-flight lock).

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use extalife_core::error::{Error, Result};
use extalife_core::types::{Command, Status, WireMessage, WireRequest};

use crate::codec::{self, FrameDecoder};

/// TCP command port of the EFC-01 controller.
pub const COMMAND_PORT: u16 = 20400;

/// Hard ceiling on one command's response wait.
///
/// The controller sends responses in chunks with no length prefix; when a
/// terminal status never arrives, the command gives up at this ceiling and
/// returns whatever was decoded (possibly nothing).
pub const DEFAULT_EXEC_CEILING: Duration = Duration::from_secs(15);

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read slice used while waiting for the login response.
const LOGIN_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Receive buffer size, matching the controller's chunking behavior.
const RECV_BUF_SIZE: usize = 8192;

/// Keep-alive frame: a single space plus the ETX terminator.
const PING_FRAME: &[u8] = b" \x03";

/// A single authenticated TCP connection to the controller.
#[derive(Debug)]
pub struct Connection {
    /// The TCP stream, `None` when disconnected.
    stream: Option<TcpStream>,
    host: String,
    port: u16,
    user: String,
    password: String,
    exec_ceiling: Duration,
    decoder: FrameDecoder,
}

impl Connection {
    /// Open a TCP connection to `host:port` and immediately log in.
    ///
    /// Returns the connection together with the raw login response; use
    /// [`login_ok`](Connection::login_ok) to check it. Socket failures at
    /// any point surface as [`Error::Connection`] wrapping the cause.
    pub async fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        exec_ceiling: Duration,
    ) -> Result<(Self, Vec<WireMessage>)> {
        let mut conn = Self {
            stream: None,
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            exec_ceiling,
            decoder: FrameDecoder::new(),
        };

        conn.open_socket().await?;
        let resp = conn
            .login()
            .await
            .map_err(|e| Error::Connection(format!("login exchange failed: {}", e)))?;
        Ok((conn, resp))
    }

    /// Whether a login response indicates a successful authentication.
    pub fn login_ok(resp: &[WireMessage]) -> bool {
        resp.first().is_some_and(|m| m.status == Status::Success)
    }

    /// The controller host this connection was established to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Shut the socket down. Subsequent sends reconnect via [`ping`](Connection::ping)
    /// or fail with [`Error::NotConnected`].
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            tracing::debug!(host = %self.host, "Controller connection closed");
        }
        self.decoder.clear();
    }

    /// Send a command and collect its framed response messages.
    ///
    /// Any unsolicited bytes already buffered on the socket are drained and
    /// discarded first, so stale notification data is never attributed to
    /// this request. The response is then accumulated in `poll_timeout`
    /// read slices until the last decoded message for this command carries
    /// a terminal status, or until the hard ceiling elapses -- at which
    /// point whatever was decoded (possibly nothing) is returned.
    ///
    /// Cross-talk from other sessions is filtered out by command code.
    pub async fn exec_command(
        &mut self,
        command: u32,
        data: Option<Value>,
        poll_timeout: Duration,
    ) -> Result<Vec<WireMessage>> {
        self.drain_stale();

        let frame = codec::encode_frame(&WireRequest { command, data })?;
        tracing::debug!(command = command, bytes = frame.len(), "Executing controller command");

        let mut stream = self.stream.take().ok_or(Error::NotConnected)?;

        if let Err(e) = stream.write_all(&frame).await {
            tracing::error!(command = command, error = %e, "Failed to send command");
            return Err(Error::Command(format!(
                "send failed for command {}: {}",
                command, e
            )));
        }
        if let Err(e) = stream.flush().await {
            return Err(Error::Command(format!(
                "flush failed for command {}: {}",
                command, e
            )));
        }

        let mut messages: Vec<WireMessage> = Vec::new();
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        let deadline = tokio::time::Instant::now() + self.exec_ceiling;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::warn!(
                    command = command,
                    decoded = messages.len(),
                    "Command hit the hard response ceiling"
                );
                break;
            }

            let slice = poll_timeout.min(remaining);
            match tokio::time::timeout(slice, stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    tracing::warn!(command = command, "Controller closed the connection");
                    return Err(Error::ConnectionLost);
                }
                Ok(Ok(n)) => {
                    tracing::trace!(command = command, bytes = n, "Response chunk received");
                    self.decoder.extend(&buf[..n]);
                    let decoded = self.decoder.drain_frames()?;
                    messages.extend(codec::filter_by_command(decoded, command));

                    if messages.last().is_some_and(|m| m.status.is_terminal()) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!(command = command, error = %e, "Read error during command");
                    return Err(Error::Command(format!(
                        "read failed for command {}: {}",
                        command, e
                    )));
                }
                Err(_) => {
                    // Quiet read slice -- keep polling until the ceiling.
                }
            }
        }

        self.stream = Some(stream);
        tracing::debug!(command = command, messages = messages.len(), "Command complete");
        Ok(messages)
    }

    /// Send the keep-alive frame.
    ///
    /// On send failure the socket is closed and reconnected (full connect
    /// plus login) to the last known host, and the ping is resent exactly
    /// once. A failure of that single retry propagates to the caller.
    pub async fn ping(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            let sent = match stream.write_all(PING_FRAME).await {
                Ok(()) => stream.flush().await.map_err(Error::Io),
                Err(e) => Err(Error::Io(e)),
            };
            match sent {
                Ok(()) => {
                    tracing::trace!(host = %self.host, "Ping sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(host = %self.host, error = %e, "Ping send failed");
                }
            }
        }

        self.close().await;
        tracing::info!(host = %self.host, "Reconnecting to controller");
        self.reopen().await?;

        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream
            .write_all(PING_FRAME)
            .await
            .map_err(|e| Error::Command(format!("ping resend failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Command(format!("ping resend failed: {}", e)))?;
        tracing::debug!(host = %self.host, "Ping resent after reconnect");
        Ok(())
    }

    /// One push-mode read slice for the notification stream.
    ///
    /// Blocks up to `recv_timeout` for data; a quiet timeout tick returns
    /// `Ok(None)` so the caller can run its silence bookkeeping. Complete
    /// frames are decoded after every read and the first message with
    /// status `notification` is returned; broadcast chatter is dropped.
    pub async fn read_push(&mut self, recv_timeout: Duration) -> Result<Option<WireMessage>> {
        let mut stream = self.stream.take().ok_or(Error::NotConnected)?;
        let mut buf = vec![0u8; RECV_BUF_SIZE];

        match tokio::time::timeout(recv_timeout, stream.read(&mut buf)).await {
            Err(_) => {
                self.stream = Some(stream);
                Ok(None)
            }
            Ok(Ok(0)) => {
                tracing::warn!(host = %self.host, "Controller closed the notification connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                self.stream = Some(stream);
                self.decoder.extend(&buf[..n]);
                let frames = self.decoder.drain_frames()?;
                Ok(frames
                    .into_iter()
                    .find(|m| m.status == Status::Notification))
            }
            Ok(Err(e)) => Err(Error::Io(e)),
        }
    }

    /// Open the TCP socket to the configured host and port.
    async fn open_socket(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        tracing::debug!(addr = %addr, "Connecting to controller");

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Connection(format!("connect to {} timed out", addr)))?
            .map_err(|e| Error::Connection(format!("connect to {} failed: {}", addr, e)))?;

        // Commands are small and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        self.decoder.clear();
        self.stream = Some(stream);
        tracing::info!(addr = %addr, "Controller connection established");
        Ok(())
    }

    /// Send the login command with the stored credentials.
    async fn login(&mut self) -> Result<Vec<WireMessage>> {
        let data = serde_json::json!({
            "password": self.password,
            "login": self.user,
        });
        self.exec_command(Command::Login.code(), Some(data), LOGIN_POLL_TIMEOUT)
            .await
    }

    /// Re-establish the socket and session after a send failure.
    async fn reopen(&mut self) -> Result<()> {
        self.open_socket().await?;
        let resp = self.login().await?;
        if !Self::login_ok(&resp) {
            self.close().await;
            return Err(Error::Connection(format!(
                "login rejected on reconnect: {:?}",
                resp
            )));
        }
        Ok(())
    }

    /// Pull and discard any bytes already queued on the socket.
    ///
    /// The controller broadcasts notifications to every connected session;
    /// anything buffered before a send belongs to nobody and must not be
    /// decoded as part of the upcoming response.
    fn drain_stale(&mut self) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };

        let mut scratch = [0u8; RECV_BUF_SIZE];
        let mut drained = 0usize;
        loop {
            match stream.try_read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }

        if drained > 0 {
            tracing::debug!(bytes = drained, "Discarded unsolicited bytes before send");
        }
        self.decoder.clear();
    }
}
