//! ETX framing codec for the EFC-01 wire protocol.
//!
//! Each frame on the wire is one UTF-8 JSON object followed by a single
//! ETX byte (0x03). The controller sends data in chunks: several frames may
//! arrive concatenated in one TCP segment, and one frame may be split
//! across many reads. [`FrameDecoder`] owns the reassembly buffer: feed it
//! every chunk as it arrives and drain whatever complete frames are
//! available.
//!
//! An unterminated trailing fragment is *not* an error -- it simply stays
//! buffered until the terminator arrives. A terminator-complete fragment
//! that fails to parse as JSON is a protocol violation and surfaces as
//! [`Error::Protocol`].
//!
//! All encoding/decoding in this module is pure -- no I/O is performed.

use extalife_core::error::{Error, Result};
use extalife_core::types::{ETX, WireMessage, WireRequest};

/// Encode a request as a wire frame: serialized JSON plus the ETX terminator.
pub fn encode_frame(request: &WireRequest) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(request)
        .map_err(|e| Error::Protocol(format!("failed to serialize request: {}", e)))?;
    bytes.push(ETX);
    Ok(bytes)
}

/// Drop decoded messages whose `command` field does not match `command`.
///
/// The controller shares one session space across all connected clients,
/// so responses to commands issued by other sessions can interleave with
/// ours. Filtering by command code ignores that cross-talk.
pub fn filter_by_command(messages: Vec<WireMessage>, command: u32) -> Vec<WireMessage> {
    messages
        .into_iter()
        .filter(|m| m.command == command)
        .collect()
}

/// Stateful reassembly buffer for ETX-terminated JSON frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly-read bytes to the reassembly buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Discard all buffered bytes.
    ///
    /// Used before sending a command, so stale notification data already
    /// buffered from other sessions is not attributed to the response.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Extract every complete frame currently in the buffer.
    ///
    /// Splits on ETX and parses each terminated fragment as one
    /// [`WireMessage`]; whitespace-only fragments (the controller sometimes
    /// emits a stray newline between frames) are dropped. Bytes after the
    /// last terminator are retained for the next call, so a partial frame
    /// yields zero messages and no error.
    pub fn drain_frames(&mut self) -> Result<Vec<WireMessage>> {
        let mut messages = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == ETX) {
            let fragment: Vec<u8> = self.buf.drain(..=pos).take(pos).collect();

            if fragment.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let message: WireMessage = serde_json::from_slice(&fragment).map_err(|e| {
                Error::Protocol(format!(
                    "malformed frame ({}): {}",
                    e,
                    String::from_utf8_lossy(&fragment)
                ))
            })?;
            messages.push(message);
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extalife_core::types::Status;
    use serde_json::json;

    fn frame(js: &str) -> Vec<u8> {
        let mut bytes = js.as_bytes().to_vec();
        bytes.push(ETX);
        bytes
    }

    #[test]
    fn encode_appends_etx() {
        let req = WireRequest {
            command: 1,
            data: Some(json!({"login": "user", "password": "pass"})),
        };
        let bytes = encode_frame(&req).unwrap();
        assert_eq!(*bytes.last().unwrap(), ETX);
        // Everything before the terminator is one valid JSON object.
        let js: serde_json::Value = serde_json::from_slice(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(js["command"], 1);
        assert_eq!(js["data"]["login"], "user");
    }

    #[test]
    fn decode_single_frame() {
        let mut dec = FrameDecoder::new();
        dec.extend(&frame(r#"{"command":1,"status":"success","data":null}"#));
        let msgs = dec.drain_frames().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].command, 1);
        assert_eq!(msgs[0].status, Status::Success);
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn decode_concatenated_frames() {
        let mut dec = FrameDecoder::new();
        let mut bytes = frame(r#"{"command":37,"status":"searching","data":null}"#);
        bytes.extend(frame(r#"{"command":37,"status":"success","data":null}"#));
        dec.extend(&bytes);
        let msgs = dec.drain_frames().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].status, Status::Success);
    }

    #[test]
    fn partial_frame_yields_nothing_and_no_error() {
        let mut dec = FrameDecoder::new();
        let full = frame(r#"{"command":20,"status":"notification","data":{"id":11}}"#);
        let (head, tail) = full.split_at(17);

        dec.extend(head);
        let msgs = dec.drain_frames().unwrap();
        assert!(msgs.is_empty());
        assert_eq!(dec.buffered(), head.len());

        dec.extend(tail);
        let msgs = dec.drain_frames().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].status, Status::Notification);
    }

    #[test]
    fn roundtrip_across_arbitrary_chunk_boundaries() {
        // Encode a sequence of frames, then feed the concatenated bytes to
        // the decoder at every possible single split point. The decoded
        // sequence must always come back complete and in order.
        let requests: Vec<WireMessage> = (0..4)
            .map(|i| WireMessage {
                command: 20 + i,
                status: Status::Success,
                data: Some(json!({"n": i})),
            })
            .collect();

        let mut wire = Vec::new();
        for msg in &requests {
            wire.extend(serde_json::to_vec(msg).unwrap());
            wire.push(ETX);
        }

        for split in 0..=wire.len() {
            let mut dec = FrameDecoder::new();
            let mut decoded = Vec::new();

            dec.extend(&wire[..split]);
            decoded.extend(dec.drain_frames().unwrap());
            dec.extend(&wire[split..]);
            decoded.extend(dec.drain_frames().unwrap());

            assert_eq!(decoded, requests, "failed at split {}", split);
        }
    }

    #[test]
    fn whitespace_fragment_is_dropped() {
        let mut dec = FrameDecoder::new();
        let mut bytes = frame(r#"{"command":1,"status":"success","data":null}"#);
        bytes.extend(frame("\n"));
        bytes.extend(frame(" "));
        dec.extend(&bytes);
        let msgs = dec.drain_frames().unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn malformed_complete_frame_is_protocol_error() {
        let mut dec = FrameDecoder::new();
        dec.extend(&frame(r#"{"command":1,"status":"#));
        let err = dec.drain_frames().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got: {:?}", err);
    }

    #[test]
    fn clear_discards_stale_bytes() {
        let mut dec = FrameDecoder::new();
        dec.extend(b"{\"comm");
        assert!(dec.buffered() > 0);
        dec.clear();
        assert_eq!(dec.buffered(), 0);
        // A fresh frame decodes cleanly after the stale prefix is gone.
        dec.extend(&frame(r#"{"command":1,"status":"success","data":null}"#));
        assert_eq!(dec.drain_frames().unwrap().len(), 1);
    }

    #[test]
    fn filter_drops_cross_talk() {
        let msgs = vec![
            WireMessage {
                command: 37,
                status: Status::Success,
                data: None,
            },
            WireMessage {
                command: 20,
                status: Status::Notification,
                data: None,
            },
            WireMessage {
                command: 37,
                status: Status::Failure,
                data: None,
            },
        ];
        let filtered = filter_by_command(msgs, 37);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|m| m.command == 37));
    }
}
