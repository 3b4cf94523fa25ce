//! Codec trait and implementations for serializing frames.
//!
//! The protocol layer doesn't care how frames become bytes — it only
//! needs something implementing [`Codec`]. [`JsonCodec`] is the default;
//! a binary codec could be swapped in later without touching other code.

use serde::{Serialize, de::DeserializeOwned};

use crate::{CLIENT_EVENT_NAMES, ClientEvent, ProtocolError};

/// Converts between protocol types and raw bytes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes an inbound client frame, distinguishing unknown event names
    /// from malformed frames.
    ///
    /// An unrecognized `event` tag comes back as
    /// [`ProtocolError::UnknownEvent`] so the handler can log-and-ignore
    /// it (forward compatibility: new client events must never crash an
    /// old server). Anything else that fails to decode is a plain
    /// [`ProtocolError::Decode`].
    fn decode_client(&self, data: &[u8]) -> Result<ClientEvent, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(data).map_err(ProtocolError::Decode)?;
        let name = value
            .get("event")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        match serde_json::from_value(value) {
            Ok(event) => Ok(event),
            Err(err) => match name {
                Some(name) if !CLIENT_EVENT_NAMES.contains(&name.as_str()) => {
                    Err(ProtocolError::UnknownEvent(name))
                }
                _ => Err(ProtocolError::Decode(err)),
            },
        }
    }
}

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// Human-readable, so frames can be inspected in browser DevTools and
/// logs. The size overhead is acceptable for a turn-based protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
