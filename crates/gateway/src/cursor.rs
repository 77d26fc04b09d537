//! Opaque cursor encode/decode (spec §3, §4.2, §6).
//!
//! A cursor wraps the sort-value tuple of the last hit on a page so the
//! next page can be requested via the engine's `search_after` primitive.
//! It is never trusted for anything but continuation position: a
//! malformed cursor is treated as "no cursor", never as an error.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CursorEnvelope {
    sort: Vec<Value>,
}

/// Encode a sort-value tuple into an opaque cursor string.
#[must_use]
pub fn encode(sort: &[Value]) -> String {
    let envelope = CursorEnvelope {
        sort: sort.to_vec(),
    };
    // Serializing a `Vec<Value>` into a `CursorEnvelope` can't fail.
    let json = serde_json::to_vec(&envelope).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cursor string back into its sort-value tuple.
///
/// Any failure (bad base64, invalid JSON, wrong shape) returns `None`
/// rather than an error, per spec: a malformed cursor means "start over",
/// not "reject the request".
#[must_use]
pub fn decode(cursor: &str) -> Option<Vec<Value>> {
    let bytes = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let envelope: CursorEnvelope = serde_json::from_slice(&bytes).ok()?;
    Some(envelope.sort)
}
