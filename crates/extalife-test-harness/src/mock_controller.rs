//! Mock EFC-01 controller for protocol-level testing.
//!
//! [`MockController`] is a lightweight TCP listener that speaks the
//! controller's line protocol (JSON frames terminated by ETX), enabling
//! deterministic testing of the client without real hardware. It accepts
//! any number of concurrent connections, answers login frames with a
//! configurable status, serves scripted responses per command code, and
//! can push notification frames to every connected session.
//!
//! Unknown commands are answered with silence, which is what the real
//! controller does and what exercises the client's response ceiling.
//!
//! # Example
//!
//! ```no_run
//! use extalife_test_harness::MockController;
//! use serde_json::json;
//!
//! # async fn example() -> extalife_core::error::Result<()> {
//! let server = MockController::start().await?;
//! server.respond_success(151, json!({"new_version": "1.2.3"}));
//! // ... connect a client to server.host()/server.port() ...
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use extalife_core::error::{Error, Result};
use extalife_core::types::ETX;

/// One observed protocol interaction, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    /// A command frame arrived from a client.
    Received { command: u32, data: Value },
    /// The scripted response for a command was written back.
    Responded { command: u32 },
}

/// Shared, mutable server script and observation log.
struct Script {
    login_status: String,
    responses: HashMap<u32, Vec<Value>>,
    response_delay: Duration,
    events: Vec<MockEvent>,
}

impl Script {
    fn new() -> Self {
        Self {
            login_status: "success".to_string(),
            responses: HashMap::new(),
            response_delay: Duration::ZERO,
            events: Vec::new(),
        }
    }
}

/// A mock controller listening on a random localhost port.
///
/// The accept loop runs in a background task from the moment
/// [`start`](MockController::start) returns; responses and the login
/// status may be (re)configured at any time, including between commands
/// of a running test.
pub struct MockController {
    addr: SocketAddr,
    script: Arc<Mutex<Script>>,
    push_tx: broadcast::Sender<Vec<u8>>,
    accept_task: JoinHandle<()>,
}

impl MockController {
    /// Bind a random port and start accepting connections.
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Connection(format!("failed to bind mock controller: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?;

        let script = Arc::new(Mutex::new(Script::new()));
        let (push_tx, _) = broadcast::channel(64);

        let accept_script = Arc::clone(&script);
        let accept_push = push_tx.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer = %peer, "Mock controller accepted connection");
                        let script = Arc::clone(&accept_script);
                        let push_rx = accept_push.subscribe();
                        tokio::spawn(serve_connection(stream, script, push_rx));
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Mock controller accept failed, stopping");
                        return;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            script,
            push_tx,
            accept_task,
        })
    }

    /// Host string clients should connect to.
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Port the mock controller is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Answer subsequent login frames with `"failure"`.
    pub fn reject_login(&self) {
        self.script.lock().unwrap().login_status = "failure".to_string();
    }

    /// Script a multi-frame response for one command code.
    ///
    /// Each value is written as its own frame, in order, whenever a frame
    /// with that command code arrives.
    pub fn respond(&self, command: u32, messages: Vec<Value>) {
        self.script.lock().unwrap().responses.insert(command, messages);
    }

    /// Script a single `"success"` response frame for one command code.
    pub fn respond_success(&self, command: u32, data: Value) {
        self.respond(
            command,
            vec![json!({"command": command, "status": "success", "data": data})],
        );
    }

    /// Delay every scripted response by `delay`.
    ///
    /// Useful for asserting that concurrent callers are serialized: with a
    /// delay in place, interleaved requests would show up as interleaved
    /// events in [`events`](MockController::events).
    pub fn set_response_delay(&self, delay: Duration) {
        self.script.lock().unwrap().response_delay = delay;
    }

    /// Push a notification frame to every connected session.
    pub fn push(&self, message: Value) {
        let mut bytes = message.to_string().into_bytes();
        bytes.push(ETX);
        // No receivers just means no one is connected yet.
        let _ = self.push_tx.send(bytes);
    }

    /// Snapshot of the observed interactions so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.script.lock().unwrap().events.clone()
    }

    /// The data payload of the most recent frame received for `command`.
    pub fn last_request(&self, command: u32) -> Option<Value> {
        self.script
            .lock()
            .unwrap()
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                MockEvent::Received { command: c, data } if *c == command => Some(data.clone()),
                _ => None,
            })
    }

    /// Stop accepting new connections. Existing sessions end with the test.
    pub fn stop(self) {
        self.accept_task.abort();
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Serve one client session until it disconnects.
async fn serve_connection(
    mut stream: TcpStream,
    script: Arc<Mutex<Script>>,
    mut push_rx: broadcast::Receiver<Vec<u8>>,
) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            read = stream.read(&mut buf) => {
                let n = match read {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                pending.extend_from_slice(&buf[..n]);

                while let Some(pos) = pending.iter().position(|&b| b == ETX) {
                    let frame: Vec<u8> = pending.drain(..=pos).take(pos).collect();
                    if handle_frame(&frame, &mut stream, &script).await.is_err() {
                        return;
                    }
                }
            }
            pushed = push_rx.recv() => {
                match pushed {
                    Ok(bytes) => {
                        if stream.write_all(&bytes).await.is_err() {
                            return;
                        }
                        let _ = stream.flush().await;
                    }
                    // Lagged: skip missed pushes, the session stays up.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}

/// Decode one frame and write the scripted reaction, if any.
async fn handle_frame(
    frame: &[u8],
    stream: &mut TcpStream,
    script: &Arc<Mutex<Script>>,
) -> std::io::Result<()> {
    // Keep-alive pings are whitespace-only frames; swallow them.
    if frame.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(());
    }

    let request: Value = match serde_json::from_slice(frame) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Mock controller got a malformed frame");
            return Ok(());
        }
    };
    let command = request.get("command").and_then(Value::as_u64).unwrap_or(0) as u32;
    let data = request.get("data").cloned().unwrap_or(Value::Null);

    // Record the arrival, then look up the scripted reply while holding
    // the lock only briefly.
    let (replies, delay) = {
        let mut script = script.lock().unwrap();
        script.events.push(MockEvent::Received {
            command,
            data: data.clone(),
        });

        if command == 1 {
            let status = script.login_status.clone();
            (
                Some(vec![json!({"command": 1, "status": status, "data": null})]),
                Duration::ZERO,
            )
        } else {
            (script.responses.get(&command).cloned(), script.response_delay)
        }
    };

    let Some(replies) = replies else {
        // Unknown command: the real controller stays silent.
        tracing::debug!(command, "Mock controller has no script for command, staying silent");
        return Ok(());
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    for reply in &replies {
        let mut bytes = reply.to_string().into_bytes();
        bytes.push(ETX);
        stream.write_all(&bytes).await?;
    }
    stream.flush().await?;

    script.lock().unwrap().events.push(MockEvent::Responded { command });
    Ok(())
}
