//! Watch live state changes pushed by the controller.
//!
//! Seeds a [`ChannelStateCache`] from a full channel fetch, then runs a
//! notification listener and prints a line whenever a channel's state
//! actually changes. Duplicate pushes are silently absorbed by the cache.
//!
//! # Usage
//!
//! ```sh
//! EXTALIFE_USER=admin EXTALIFE_PASSWORD=secret \
//!     cargo run -p extalife --example monitor_notifications -- 192.168.1.10
//! ```
//!
//! The controller IP argument is optional; without it the example relies
//! on autodiscovery.

use extalife::{
    ChannelStateCache, ClientOptions, ExtaLifeClient, ListenerEvent, ListenerOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let user = std::env::var("EXTALIFE_USER").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("EXTALIFE_PASSWORD")
        .map_err(|_| anyhow::anyhow!("EXTALIFE_PASSWORD must be set"))?;

    let mut options = ClientOptions::new(&user, &password);
    if let Some(host) = std::env::args().nth(1) {
        options = options.with_host(&host);
    }

    let client = ExtaLifeClient::connect(options).await?;
    println!("Connected to controller at {}", client.host());

    let mut cache = ChannelStateCache::new();
    if let Some(channels) = client.get_channels().await {
        cache.replace_all(&channels);
        println!("Tracking {} channels", cache.len());
    }

    let (listener, mut events) = client.start_listener(ListenerOptions::default()).await?;
    println!("Listening for notifications (Ctrl-C to stop)...\n");

    while let Some(event) = events.recv().await {
        match event {
            ListenerEvent::Connected => println!("listener connected"),
            ListenerEvent::Notification(msg) => {
                if let Some((channel_id, changed)) = cache.apply_notification(&msg) {
                    if changed {
                        println!("{}: {:?}", channel_id, cache.get(&channel_id));
                    }
                }
            }
            ListenerEvent::Silence => {
                // Keep the command connection alive too.
                if let Err(e) = client.ping().await {
                    eprintln!("command ping failed: {}", e);
                }
            }
            ListenerEvent::Disconnected => {
                eprintln!("notification connection lost");
                break;
            }
        }
    }

    listener.stop();
    Ok(())
}
