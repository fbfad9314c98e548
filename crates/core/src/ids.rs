//! Opaque external identifiers and the dense internal ids the bitmap
//! index is built over.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Isolation boundary. Every other entity is keyed by a `WorkspaceId`; no
/// operation may observe state across workspaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Wrap an opaque workspace string.
    pub fn new(id: impl Into<String>) -> Self {
        WorkspaceId(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkspaceId {
    fn from(s: String) -> Self {
        WorkspaceId(s)
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        WorkspaceId(s.to_string())
    }
}

/// External, opaque, globally-unique-within-workspace card identifier.
/// Never interpreted, normalized, or tokenized by the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardExtId(String);

impl CardExtId {
    /// Wrap an opaque card id string.
    pub fn new(id: impl Into<String>) -> Self {
        CardExtId(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardExtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CardExtId {
    fn from(s: String) -> Self {
        CardExtId(s)
    }
}

impl From<&str> for CardExtId {
    fn from(s: &str) -> Self {
        CardExtId(s.to_string())
    }
}

/// External, opaque, case-exact tag name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagExtId(String);

impl TagExtId {
    /// Wrap an opaque tag name. Non-empty is enforced by the catalog at
    /// intern time, not here — this type is a pure wrapper.
    pub fn new(id: impl Into<String>) -> Self {
        TagExtId(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagExtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TagExtId {
    fn from(s: String) -> Self {
        TagExtId(s)
    }
}

impl From<&str> for TagExtId {
    fn from(s: &str) -> Self {
        TagExtId(s.to_string())
    }
}

/// Dense integer position in `[0, N_W)` assigned to a card by the
/// catalog. Stable for the lifetime of the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position(pub u32);

impl Position {
    /// Raw `u32` value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal, monotonic 32-bit tag identifier, unique within a workspace.
/// Stable for the lifetime of the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub u32);

impl TagId {
    /// Raw `u32` value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reserved internal tag id for the `Live_W` bitmap — the set of
/// non-tombstoned positions. Stored through the same `BitmapStore` as
/// ordinary tag bitmaps (persisted as the `live` file per §6) but never
/// allocated to a real tag by the catalog.
pub const LIVE_TAG_ID: TagId = TagId(u32::MAX);

/// Canonical key derived from workspace, sorted tag sets, limit, and the
/// bitmap versions actually observed while computing a result — rendered
/// as lowercase hex for the wire format (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
