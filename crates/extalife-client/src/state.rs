//! Last-known channel state repository.
//!
//! [`ChannelStateCache`] owns the mapping from channel id to the most
//! recently committed field set. Updates flow in from two racing sources --
//! polled fetches on the command connection and pushes on the notification
//! connection -- with no cross-connection ordering guarantee, so the cache
//! applies an update only when a field value actually differs and reports
//! whether anything changed. Consumers emit downstream change events only
//! on a real delta, which makes late-arriving duplicates harmless.
//!
//! Access rules: one writer per update (the consumer task applying fetch
//! results or notifications), readers see the latest committed state.

use std::collections::HashMap;

use serde_json::{Map, Value};

use extalife_core::types::{ChannelRecord, WireMessage};

/// In-memory repository of last-known channel state, keyed by channel id.
#[derive(Debug, Default)]
pub struct ChannelStateCache {
    channels: HashMap<String, Map<String, Value>>,
}

impl ChannelStateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cache with the records of a fresh fetch.
    pub fn replace_all(&mut self, records: &[ChannelRecord]) {
        self.channels = records
            .iter()
            .map(|r| (r.id.clone(), r.data.clone()))
            .collect();
    }

    /// The last committed state for one channel.
    pub fn get(&self, channel_id: &str) -> Option<&Map<String, Value>> {
        self.channels.get(channel_id)
    }

    /// Number of channels currently tracked.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Merge changed fields into one channel's state.
    ///
    /// `mode_val` fields are canonicalized to an integer before the
    /// comparison (see [`normalize_mode_val`]). Returns `true` when at
    /// least one field actually changed; an update that matches the cached
    /// state byte-for-byte returns `false` so no redundant downstream
    /// change event is emitted. An unknown channel id inserts a new entry.
    pub fn apply_update(&mut self, channel_id: &str, fields: &Map<String, Value>) -> bool {
        let entry = self.channels.entry(channel_id.to_string()).or_default();
        let mut changed = false;

        for (key, value) in fields {
            let value = if key == "mode_val" {
                normalize_mode_val(value).map_or_else(|| value.clone(), Value::from)
            } else {
                value.clone()
            };

            if entry.get(key) != Some(&value) {
                entry.insert(key.clone(), value);
                changed = true;
            }
        }

        changed
    }

    /// Apply a notification push to the cache.
    ///
    /// The payload carries `{id, channel, ...changedFields}`; the channel
    /// key is derived from the `id` and `channel` fields and the remaining
    /// fields are merged. Returns the affected channel id and whether the
    /// state actually changed, or `None` when the payload has no usable
    /// id/channel pair.
    pub fn apply_notification(&mut self, message: &WireMessage) -> Option<(String, bool)> {
        let data = message.data.as_ref()?.as_object()?;
        let id = data.get("id")?;
        let channel = data.get("channel")?;
        let channel_id = format!("{}-{}", scalar(id), scalar(channel));

        let fields: Map<String, Value> = data
            .iter()
            .filter(|(k, _)| k.as_str() != "id" && k.as_str() != "channel")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let changed = self.apply_update(&channel_id, &fields);
        Some((channel_id, changed))
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Canonicalize a `mode_val` field to an integer.
///
/// The controller reports this value inconsistently: as a plain integer on
/// some commands and as a hexadecimal string on others. The canonical
/// internal representation is the integer; string inputs are parsed as
/// hexadecimal (with an optional `0x` prefix) at this boundary. Returns
/// `None` for values that fit neither shape.
pub fn normalize_mode_val(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
            i64::from_str_radix(digits, 16).ok()
        }
        _ => None,
    }
}
