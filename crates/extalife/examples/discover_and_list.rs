//! Find a controller on the LAN and list everything it knows about.
//!
//! Uses UDP multicast autodiscovery, logs in, prints the firmware version
//! and one line per channel with its alias and current state fields.
//!
//! # Usage
//!
//! ```sh
//! EXTALIFE_USER=admin EXTALIFE_PASSWORD=secret \
//!     cargo run -p extalife --example discover_and_list
//! ```

use extalife::{ClientOptions, ExtaLifeClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let user = std::env::var("EXTALIFE_USER").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("EXTALIFE_PASSWORD")
        .map_err(|_| anyhow::anyhow!("EXTALIFE_PASSWORD must be set"))?;

    println!("Discovering EFC-01 controller on the LAN...");
    let client = ExtaLifeClient::connect(ClientOptions::new(&user, &password)).await?;
    println!("Connected to controller at {}", client.host());

    match client.get_version().await {
        Some(version) => println!("Firmware: {}", version),
        None => println!("Firmware: (controller did not answer)"),
    }

    let channels = client
        .get_channels()
        .await
        .ok_or_else(|| anyhow::anyhow!("channel fetch failed"))?;
    println!("\n{} channels:", channels.len());

    for channel in &channels {
        let alias = channel
            .data
            .get("alias")
            .and_then(|v| v.as_str())
            .unwrap_or("(no alias)");
        let device_type = channel.data.get("type").cloned().unwrap_or_default();
        println!("  {:>8}  type {:>4}  {}", channel.id, device_type, alias);
    }

    Ok(())
}
