//! Wire message and command types for the EFC-01 JSON protocol.
//!
//! The controller speaks line-delimited JSON over TCP: each frame is a
//! UTF-8 JSON object followed by a single ETX byte (0x03). Requests carry
//! a numeric command code and an optional data payload; responses carry at
//! least a command code and a status.
//!
//! Device payloads are deliberately kept as [`serde_json::Value`]: the
//! controller's device dictionaries vary by device type and firmware, and
//! the entity layer consumes them as free-form field maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// The ETX byte terminating every wire frame.
pub const ETX: u8 = 0x03;

/// Command codes understood by the EFC-01 controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Authenticate the session (`{login, password}` payload).
    Login,
    /// Control a device channel (`{id, channel, state, ...}` payload).
    ControlDevice,
    /// Fetch all receiver devices and their channel states.
    FetchReceivers,
    /// Fetch all sensor devices and their channel states.
    FetchSensors,
    /// Restart the controller.
    Restart,
    /// Fetch controller software version info.
    Version,
    /// Fetch Exta Free (legacy one-way radio) devices.
    FetchExtaFree,
}

impl Command {
    /// The numeric command code sent on the wire.
    pub const fn code(self) -> u32 {
        match self {
            Command::Login => 1,
            Command::ControlDevice => 20,
            Command::FetchReceivers => 37,
            Command::FetchSensors => 38,
            Command::Restart => 150,
            Command::Version => 151,
            Command::FetchExtaFree => 203,
        }
    }
}

/// Response status values used by the controller.
///
/// `success`/`failure` terminate a command exchange; `notification` marks
/// an unsolicited state push; `broadcast` is used for discovery and other
/// session-wide chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
    Notification,
    Broadcast,
    /// Any status string this library does not know about. Kept instead of
    /// failing the whole frame so one odd message cannot poison a decode.
    #[serde(other)]
    Unknown,
}

impl Status {
    /// Whether this status terminates a command/response exchange.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }
}

/// A request frame: `{"command": <code>, "data": <payload|null>}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WireRequest {
    /// Numeric command code.
    pub command: u32,
    /// Free-form payload; serialized as JSON `null` when absent.
    pub data: Option<Value>,
}

/// A decoded message from the controller.
///
/// Covers command responses, unsolicited notifications, and broadcast
/// chatter from other sessions sharing the connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    /// Command code this message belongs to (0 for broadcasts).
    #[serde(default)]
    pub command: u32,
    /// Message status.
    pub status: Status,
    /// Free-form payload.
    #[serde(default)]
    pub data: Option<Value>,
}

/// One controllable/observable sub-unit of a physical device.
///
/// Built by the channel model builder from the controller's nested
/// device/state JSON: `data` is the union of the device-level fields and
/// one per-channel state entry, and `id` is `"<deviceId>-<channelNumber>"`,
/// unique per channel within a single fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRecord {
    /// API channel id, `"<deviceId>-<channelNumber>"`.
    pub id: String,
    /// Merged device and channel-state fields.
    pub data: Map<String, Value>,
}

/// Actions the entity layer can request on a channel.
///
/// Each action maps to an implicit `state` code in the control command
/// (command 20); actions with no implicit code (`SetPosition`,
/// `SetBrightness`, `SetColor`, `SetMode`) send `state: null` and expect
/// the caller to supply the effective value via extra fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    TurnOn,
    TurnOff,
    /// Open a cover.
    Up,
    /// Close a cover.
    Down,
    /// Stop cover movement.
    Stop,
    SetPosition,
    SetBrightness,
    SetColor,
    SetTemperature,
    /// Sunblind operating mode.
    SetMode,
    /// RGT thermostat automatic mode.
    RgtSetModeAuto,
    /// RGT thermostat manual mode.
    RgtSetModeManual,
    /// Exta Free transmitter button emulation.
    ExfreeTurnOnPress,
    ExfreeTurnOnRelease,
    ExfreeTurnOffPress,
    ExfreeTurnOffRelease,
}

impl Action {
    /// The implicit `state` code for this action, if any.
    pub const fn state_code(self) -> Option<i64> {
        match self {
            Action::TurnOn => Some(1),
            Action::TurnOff => Some(0),
            Action::Up => Some(1),
            Action::Down => Some(0),
            Action::Stop => Some(2),
            Action::SetTemperature => Some(1),
            Action::RgtSetModeAuto => Some(0),
            Action::RgtSetModeManual => Some(1),
            Action::ExfreeTurnOnPress => Some(1),
            Action::ExfreeTurnOnRelease => Some(2),
            Action::ExfreeTurnOffPress => Some(3),
            Action::ExfreeTurnOffRelease => Some(4),
            Action::SetPosition
            | Action::SetBrightness
            | Action::SetColor
            | Action::SetMode => None,
        }
    }

    /// The controller-facing action name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::TurnOn => "TURN_ON",
            Action::TurnOff => "TURN_OFF",
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Stop => "STOP",
            Action::SetPosition => "SET_POSITION",
            Action::SetBrightness => "SET_BRIGHTNESS",
            Action::SetColor => "SET_COLOR",
            Action::SetTemperature => "SET_TEMPERATURE",
            Action::SetMode => "SET_MODE",
            Action::RgtSetModeAuto => "RGT_SET_MODE_AUTO",
            Action::RgtSetModeManual => "RGT_SET_MODE_MANUAL",
            Action::ExfreeTurnOnPress => "TURN_ON_PRESS",
            Action::ExfreeTurnOnRelease => "TURN_ON_RELEASE",
            Action::ExfreeTurnOffPress => "TURN_OFF_PRESS",
            Action::ExfreeTurnOffRelease => "TURN_OFF_RELEASE",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split an API channel id `"<deviceId>-<channelNumber>"` into its numeric
/// device id and channel number.
pub fn parse_channel_id(channel_id: &str) -> Result<(i64, i64)> {
    let (device, channel) = channel_id
        .split_once('-')
        .ok_or_else(|| bad_channel_id(channel_id))?;
    let device: i64 = device.parse().map_err(|_| bad_channel_id(channel_id))?;
    let channel: i64 = channel.parse().map_err(|_| bad_channel_id(channel_id))?;
    Ok((device, channel))
}

fn bad_channel_id(channel_id: &str) -> Error {
    Error::InvalidParameter(format!(
        "channel id must be \"<deviceId>-<channelNumber>\", got {:?}",
        channel_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_codes() {
        assert_eq!(Command::Login.code(), 1);
        assert_eq!(Command::ControlDevice.code(), 20);
        assert_eq!(Command::FetchReceivers.code(), 37);
        assert_eq!(Command::FetchSensors.code(), 38);
        assert_eq!(Command::Restart.code(), 150);
        assert_eq!(Command::Version.code(), 151);
        assert_eq!(Command::FetchExtaFree.code(), 203);
    }

    #[test]
    fn status_deserializes_lowercase() {
        let s: Status = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(s, Status::Success);
        let s: Status = serde_json::from_str("\"notification\"").unwrap();
        assert_eq!(s, Status::Notification);
    }

    #[test]
    fn status_unknown_does_not_fail() {
        let s: Status = serde_json::from_str("\"searching\"").unwrap();
        assert_eq!(s, Status::Unknown);
        assert!(!s.is_terminal());
    }

    #[test]
    fn status_terminal() {
        assert!(Status::Success.is_terminal());
        assert!(Status::Failure.is_terminal());
        assert!(!Status::Notification.is_terminal());
        assert!(!Status::Broadcast.is_terminal());
    }

    #[test]
    fn wire_request_serializes_null_data() {
        let req = WireRequest {
            command: Command::FetchReceivers.code(),
            data: None,
        };
        let js = serde_json::to_value(&req).unwrap();
        assert_eq!(js, json!({"command": 37, "data": null}));
    }

    #[test]
    fn wire_message_deserializes_response() {
        let msg: WireMessage =
            serde_json::from_str(r#"{"command":1,"status":"success","data":null}"#).unwrap();
        assert_eq!(msg.command, 1);
        assert_eq!(msg.status, Status::Success);
        assert!(msg.data.is_none());
    }

    #[test]
    fn wire_message_tolerates_missing_command() {
        // Some pushes omit the command field; it defaults to 0.
        let msg: WireMessage =
            serde_json::from_str(r#"{"status":"notification","data":{"id":11}}"#).unwrap();
        assert_eq!(msg.command, 0);
        assert_eq!(msg.status, Status::Notification);
    }

    #[test]
    fn action_state_codes() {
        assert_eq!(Action::TurnOn.state_code(), Some(1));
        assert_eq!(Action::TurnOff.state_code(), Some(0));
        assert_eq!(Action::Up.state_code(), Some(1));
        assert_eq!(Action::Down.state_code(), Some(0));
        assert_eq!(Action::Stop.state_code(), Some(2));
        assert_eq!(Action::SetPosition.state_code(), None);
        assert_eq!(Action::SetBrightness.state_code(), None);
        assert_eq!(Action::RgtSetModeAuto.state_code(), Some(0));
        assert_eq!(Action::RgtSetModeManual.state_code(), Some(1));
        assert_eq!(Action::SetTemperature.state_code(), Some(1));
        assert_eq!(Action::ExfreeTurnOnPress.state_code(), Some(1));
        assert_eq!(Action::ExfreeTurnOnRelease.state_code(), Some(2));
        assert_eq!(Action::ExfreeTurnOffPress.state_code(), Some(3));
        assert_eq!(Action::ExfreeTurnOffRelease.state_code(), Some(4));
    }

    #[test]
    fn action_names() {
        assert_eq!(Action::TurnOn.as_str(), "TURN_ON");
        assert_eq!(Action::ExfreeTurnOffRelease.as_str(), "TURN_OFF_RELEASE");
        assert_eq!(Action::Stop.to_string(), "STOP");
    }

    #[test]
    fn parse_channel_id_ok() {
        assert_eq!(parse_channel_id("11-1").unwrap(), (11, 1));
        assert_eq!(parse_channel_id("725149-2").unwrap(), (725_149, 2));
    }

    #[test]
    fn parse_channel_id_rejects_garbage() {
        assert!(matches!(
            parse_channel_id("11"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_channel_id("a-b"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_channel_id(""),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn channel_record_roundtrip() {
        let mut data = Map::new();
        data.insert("serial".into(), json!(725_149));
        let rec = ChannelRecord {
            id: "11-1".into(),
            data,
        };
        let js = serde_json::to_string(&rec).unwrap();
        let back: ChannelRecord = serde_json::from_str(&js).unwrap();
        assert_eq!(back, rec);
    }
}
