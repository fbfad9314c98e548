//! Append-only log record shapes (§6: `catalog/cards`, `catalog/tags`).

use serde::{Deserialize, Serialize};

/// A single entry in the `catalog/cards` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Dense position assigned to this card.
    pub position: u32,
    /// External card id.
    pub card_ext_id: String,
    /// `true` if live, `false` if tombstoned.
    pub live: bool,
}

/// A single entry in the `catalog/tags` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// Internal tag id.
    pub tag_id: u32,
    /// External tag name.
    pub tag_ext_name: String,
    /// Tag type discriminant, fixed at first intern (§3).
    pub tag_type: u8,
    /// `true` if this record represents a `delete_tag` (§4.5).
    pub deleted: bool,
}
