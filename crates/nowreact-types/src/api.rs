//! Request and response bodies exchanged with the web client.
//!
//! These types export `TypeScript` bindings so the browser client and the
//! server agree on field names.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A request to set one cell.
///
/// The index is signed so that negative values decode and are rejected as
/// out-of-range rather than as malformed input. Older clients send the
/// index under the key `location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Submission {
    /// Cell content. Any string is accepted; the empty string clears.
    pub emoji: String,
    /// Row-major cell index.
    #[serde(alias = "location")]
    #[ts(type = "number")]
    pub index: i64,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HeightResponse {
    /// Current canvas height.
    #[ts(type = "number")]
    pub height: u64,
}
