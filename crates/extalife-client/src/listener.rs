//! Background notification listener.
//!
//! The controller pushes status changes to every connected session, but
//! mixing pushes with command responses on one socket is fragile, so the
//! listener opens its *own* connection (separate login) to the same host
//! and spends its life blocked on push reads. Decoded notifications are
//! forwarded to the consumer through a bounded mpsc channel as
//! [`ListenerEvent`]s.
//!
//! Keep-alive: the read loop uses a short socket receive timeout
//! (1.5s) so it can track a longer silence timeout (9s). When nothing
//! arrived for a whole silence window, the listener pings its own
//! connection (reconnecting once on a failed send) and emits
//! [`ListenerEvent::Silence`] so the consumer can ping the separate
//! command connection too.
//!
//! The loop never returns normally. It ends only when the consumer drops
//! the receiver or the socket fails fatally (after a final
//! [`ListenerEvent::Disconnected`]); restart-on-crash policy belongs to
//! the host application.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use extalife_core::error::{Error, Result};
use extalife_core::events::ListenerEvent;

use crate::connection::{Connection, DEFAULT_EXEC_CEILING};

/// Options for the notification listener loop.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// Keep-alive window: ping and emit [`ListenerEvent::Silence`] when no
    /// notification arrived for this long.
    pub silence_timeout: Duration,
    /// Socket-level receive timeout for one read slice.
    pub recv_timeout: Duration,
    /// Capacity of the event channel handed to the consumer.
    pub channel_capacity: usize,
    /// Response ceiling for the listener's own login exchanges.
    pub exec_ceiling: Duration,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_secs(9),
            recv_timeout: Duration::from_millis(1500),
            channel_capacity: 64,
            exec_ceiling: DEFAULT_EXEC_CEILING,
        }
    }
}

/// Handle to the spawned listener task.
pub struct NotificationListener {
    task: JoinHandle<()>,
}

impl NotificationListener {
    /// Open a dedicated connection, log in, and spawn the read loop.
    ///
    /// Returns the task handle and the event receiver. A rejected login or
    /// socket failure during setup fails here; once started, failures are
    /// reported through the channel instead.
    pub async fn start(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        options: ListenerOptions,
    ) -> Result<(Self, mpsc::Receiver<ListenerEvent>)> {
        let (conn, resp) = Connection::connect(host, port, user, password, options.exec_ceiling).await?;
        if !Connection::login_ok(&resp) {
            return Err(Error::Connection(format!(
                "notification listener login failed: {:?}",
                resp
            )));
        }

        tracing::debug!(host = %host, "Notification listener connected");

        let (tx, rx) = mpsc::channel(options.channel_capacity);
        let task = tokio::spawn(listen_loop(conn, options, tx));

        Ok((Self { task }, rx))
    }

    /// Whether the read loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Abort the read loop and drop the connection.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// The listener read loop.
async fn listen_loop(
    mut conn: Connection,
    options: ListenerOptions,
    tx: mpsc::Sender<ListenerEvent>,
) {
    if tx.send(ListenerEvent::Connected).await.is_err() {
        return;
    }

    let mut last_activity = tokio::time::Instant::now();

    loop {
        if last_activity.elapsed() >= options.silence_timeout {
            tracing::trace!("Notification silence window elapsed, pinging");
            if let Err(e) = conn.ping().await {
                tracing::warn!(error = %e, "Listener keep-alive ping failed");
            }
            if tx.send(ListenerEvent::Silence).await.is_err() {
                tracing::debug!("Listener consumer gone, stopping");
                return;
            }
            last_activity = tokio::time::Instant::now();
        }

        match conn.read_push(options.recv_timeout).await {
            Ok(Some(message)) => {
                tracing::debug!(command = message.command, "Notification received");
                last_activity = tokio::time::Instant::now();
                if tx.send(ListenerEvent::Notification(message)).await.is_err() {
                    tracing::debug!("Listener consumer gone, stopping");
                    return;
                }
            }
            Ok(None) => {
                // Quiet read slice.
            }
            Err(e) => {
                tracing::error!(error = %e, "Notification connection failed, listener stopping");
                let _ = tx.send(ListenerEvent::Disconnected).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extalife_core::types::ETX;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn write_frame(stream: &mut TcpStream, msg: &serde_json::Value) {
        let mut bytes = serde_json::to_vec(msg).unwrap();
        bytes.push(ETX);
        stream.write_all(&bytes).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Accept one connection, consume the login frame, answer it.
    async fn accept_and_login(listener: &TcpListener, status: &str) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1];
        loop {
            stream.read_exact(&mut buf).await.unwrap();
            if buf[0] == ETX {
                break;
            }
        }
        write_frame(
            &mut stream,
            &json!({"command": 1, "status": status, "data": null}),
        )
        .await;
        stream
    }

    fn fast_options() -> ListenerOptions {
        ListenerOptions {
            silence_timeout: Duration::from_millis(300),
            recv_timeout: Duration::from_millis(50),
            channel_capacity: 16,
            exec_ceiling: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn delivers_notifications_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut stream = accept_and_login(&listener, "success").await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            write_frame(
                &mut stream,
                &json!({"command": 20, "status": "notification", "data": {"id": 11, "channel": 1, "power": 1}}),
            )
            .await;
            write_frame(
                &mut stream,
                &json!({"command": 20, "status": "notification", "data": {"id": 11, "channel": 2, "power": 0}}),
            )
            .await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (handle, mut rx) = NotificationListener::start(
            &addr.ip().to_string(),
            addr.port(),
            "user",
            "pass",
            fast_options(),
        )
        .await
        .unwrap();

        assert!(matches!(rx.recv().await, Some(ListenerEvent::Connected)));

        let first = rx.recv().await.unwrap();
        let ListenerEvent::Notification(msg) = first else {
            panic!("expected notification, got {:?}", first);
        };
        assert_eq!(msg.data.as_ref().unwrap()["channel"], 1);

        let second = rx.recv().await.unwrap();
        let ListenerEvent::Notification(msg) = second else {
            panic!("expected notification, got {:?}", second);
        };
        assert_eq!(msg.data.as_ref().unwrap()["channel"], 2);

        assert!(handle.is_running());
        handle.stop();
        server.abort();
    }

    #[tokio::test]
    async fn silence_window_pings_and_emits_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut stream = accept_and_login(&listener, "success").await;
            // Stay quiet; the listener should ping us. Capture the bytes.
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b" \x03");
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (handle, mut rx) = NotificationListener::start(
            &addr.ip().to_string(),
            addr.port(),
            "user",
            "pass",
            fast_options(),
        )
        .await
        .unwrap();

        assert!(matches!(rx.recv().await, Some(ListenerEvent::Connected)));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expected a silence event in time")
            .unwrap();
        assert!(matches!(event, ListenerEvent::Silence));

        handle.stop();
        server.abort();
    }

    #[tokio::test]
    async fn rejected_login_fails_startup() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let _stream = accept_and_login(&listener, "failure").await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let result = NotificationListener::start(
            &addr.ip().to_string(),
            addr.port(),
            "user",
            "bad",
            fast_options(),
        )
        .await;
        assert!(matches!(result, Err(Error::Connection(_))));

        server.abort();
    }

    #[tokio::test]
    async fn fatal_socket_error_emits_disconnected_and_stops() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let stream = accept_and_login(&listener, "success").await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(stream);
        });

        let (handle, mut rx) = NotificationListener::start(
            &addr.ip().to_string(),
            addr.port(),
            "user",
            "pass",
            fast_options(),
        )
        .await
        .unwrap();

        assert!(matches!(rx.recv().await, Some(ListenerEvent::Connected)));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expected a disconnect event in time")
            .unwrap();
        assert!(matches!(event, ListenerEvent::Disconnected));

        // The loop has terminated; the channel is closed.
        assert!(rx.recv().await.is_none());
        assert!(!handle.is_running());

        server.await.unwrap();
    }
}
