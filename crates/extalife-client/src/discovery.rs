//! EFC-01 controller autodiscovery via UDP multicast.
//!
//! The controller announces itself by sending a fixed broadcast frame to
//! multicast group 225.0.0.1 on UDP port 20401. When no static IP is
//! configured, the client joins the group, waits briefly for one matching
//! datagram, and uses the sender's source address as the controller IP.
//!
//! This is a best-effort probe, not a hard dependency: every failure path
//! (bind error, join error, timeout, non-matching traffic) yields `None`.
//!
//! # Usage
//!
//! ```no_run
//! use extalife_client::discovery;
//! use std::time::Duration;
//!
//! # async fn example() {
//! if let Some(ip) = discovery::discover(Duration::from_secs(3)).await {
//!     println!("controller found at {}", ip);
//! }
//! # }
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Multicast group the controller broadcasts to.
pub const DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(225, 0, 0, 1);

/// UDP port the controller broadcasts on.
pub const DISCOVERY_PORT: u16 = 20401;

/// The exact announcement frame the controller broadcasts (ETX included).
pub const BROADCAST_PAYLOAD: &[u8] = b"{\"status\":\"broadcast\",\"command\":0,\"data\":null}\x03";

/// Default bounded wait for one announcement datagram.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Listen for the controller announcement on the standard group and port.
///
/// Returns the sender IP of the first datagram whose payload exactly
/// matches the known announcement, or `None` if nothing matching arrives
/// within `timeout`.
pub async fn discover(timeout: Duration) -> Option<IpAddr> {
    discover_on(DISCOVERY_GROUP, DISCOVERY_PORT, timeout).await
}

/// Listen on a specific group and port.
///
/// This variant lets tests send mock announcements over loopback on a
/// non-privileged port.
pub async fn discover_on(group: Ipv4Addr, port: u16, timeout: Duration) -> Option<IpAddr> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let socket = match tokio::net::UdpSocket::bind(&bind_addr).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(
                addr = %bind_addr,
                error = %e,
                "Could not bind UDP socket for controller discovery"
            );
            return None;
        }
    };

    // Join on all interfaces. Failure is non-fatal: plain unicast datagrams
    // to the bound port (as used in loopback tests) still arrive.
    if let Err(e) = socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED) {
        tracing::warn!(group = %group, error = %e, "Failed to join discovery multicast group");
    }

    tracing::debug!(group = %group, port = port, "Listening for controller announcement");

    let mut buf = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, src_addr))) => {
                if &buf[..n] == BROADCAST_PAYLOAD {
                    tracing::debug!(ip = %src_addr.ip(), "Controller announcement received");
                    return Some(src_addr.ip());
                }
                // Unrelated multicast traffic -- keep waiting.
                tracing::trace!(
                    from = %src_addr,
                    bytes = n,
                    "Ignoring non-matching discovery datagram"
                );
            }
            Ok(Err(e)) => {
                tracing::trace!(error = %e, "Discovery recv error");
            }
            Err(_) => {
                break;
            }
        }
    }

    tracing::debug!("No controller announcement within timeout");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn free_udp_port() -> u16 {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        drop(socket);
        port
    }

    #[tokio::test]
    async fn timeout_returns_none() {
        let port = free_udp_port().await;
        let result = discover_on(DISCOVERY_GROUP, port, Duration::from_millis(50)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn matching_announcement_returns_sender_ip() {
        let port = free_udp_port().await;

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let sock = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
            sock.send_to(BROADCAST_PAYLOAD, ("127.0.0.1", port))
                .await
                .unwrap();
        });

        let result = discover_on(DISCOVERY_GROUP, port, Duration::from_millis(500)).await;
        sender.await.unwrap();

        assert_eq!(result, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn non_matching_payload_is_ignored() {
        let port = free_udp_port().await;

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let sock = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
            sock.send_to(b"not the controller", ("127.0.0.1", port))
                .await
                .unwrap();
        });

        let result = discover_on(DISCOVERY_GROUP, port, Duration::from_millis(200)).await;
        sender.await.unwrap();

        assert!(result.is_none());
    }
}
