use crate::ids::{CardExtId, TagExtId};

/// A single card-level mutation, as accepted by the Index Writer (§4.5).
/// Mutations are applied in a batch under the Writer's exclusive
/// per-workspace lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardMutation {
    /// Interns `card_ext_id` and every tag name in `tags` (as `User`
    /// tags), then sets the card's tag assignment to exactly `tags` —
    /// diffed against its current assignment.
    UpsertCard {
        /// External card id.
        card_ext_id: CardExtId,
        /// Full desired tag set for this card.
        tags: Vec<TagExtId>,
    },
    /// Tombstones the card and clears its bit from every tag bitmap that
    /// currently contains it.
    DeleteCard {
        /// External card id.
        card_ext_id: CardExtId,
    },
    /// Renames a tag in the Catalog only; no bitmap is rewritten since
    /// tag identity (`TagId`) is unchanged.
    RenameTag {
        /// Current external tag name.
        old: TagExtId,
        /// New external tag name.
        new: TagExtId,
    },
    /// Removes a tag's bitmap and header entirely; result-cache entries
    /// referencing it are invalidated.
    DeleteTag {
        /// External tag name to remove.
        tag_ext_name: TagExtId,
    },
}
