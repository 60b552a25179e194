//! Channel model builder: nested controller JSON to flat channel records.
//!
//! The fetch commands return devices with a nested per-channel `state`
//! list:
//!
//! ```text
//! {"devices": [{
//!     "id": 11, "type": 11, "serial": 725149, ...,
//!     "state": [
//!         {"channel": 1, "alias": "Kuchnia 1-1", "power": 0, ...},
//!         {"channel": 2, ...}
//!     ]
//! }]}
//! ```
//!
//! The entity layer wants one record per channel instead, keyed by
//! `"<deviceId>-<channelNumber>"` and carrying the union of the device
//! fields and that channel's state fields. This module is a pure
//! transform: no I/O, deterministic, order-preserving.

use serde_json::{Map, Value};

use extalife_core::types::{ChannelRecord, WireMessage};

/// Flatten fetch-response messages into one record per channel.
///
/// Devices and their states are processed in input order. State fields are
/// inserted first, then the device fields (minus the `state` list) are
/// overlaid on top; the two sets are disjoint in practice. Entries without
/// a device list, a device id, or a channel number are skipped.
pub fn build_channel_records(messages: &[WireMessage]) -> Vec<ChannelRecord> {
    let mut records = Vec::new();

    for message in messages {
        let devices = message
            .data
            .as_ref()
            .and_then(|d| d.get("devices"))
            .and_then(Value::as_array);
        let Some(devices) = devices else {
            continue;
        };

        for device in devices {
            let Some(device_obj) = device.as_object() else {
                continue;
            };
            let Some(device_id) = device_obj.get("id") else {
                continue;
            };

            let mut device_fields = device_obj.clone();
            let states = device_fields.remove("state");
            let Some(states) = states.as_ref().and_then(Value::as_array) else {
                continue;
            };

            for state in states {
                let Some(state_obj) = state.as_object() else {
                    continue;
                };
                let Some(channel) = state_obj.get("channel") else {
                    continue;
                };

                let mut data = state_obj.clone();
                for (key, value) in &device_fields {
                    data.insert(key.clone(), value.clone());
                }

                records.push(ChannelRecord {
                    id: format!("{}-{}", plain(device_id), plain(channel)),
                    data,
                });
            }
        }
    }

    records
}

/// Render a JSON scalar the way it appears in a channel id (no quotes).
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
