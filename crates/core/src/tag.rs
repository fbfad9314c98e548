use serde::{Deserialize, Serialize};

/// Classification fixed at first intern and never mutated thereafter.
/// The filter engine only ever consumes `User` tags when building
/// bitmaps; the three `System*` values pass through untouched for
/// external collaborators (zone chrome, mutation provenance, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagType {
    /// A user-authored tag. The only kind the bitmap index tracks.
    User,
    /// Pass-through metadata describing a spatial-zone operator.
    SystemOperator,
    /// Pass-through metadata describing a zone modifier.
    SystemModifier,
    /// Pass-through metadata recording a mutation's provenance.
    SystemMutation,
}

impl TagType {
    /// Whether the bitmap index should track this tag. Only `User` tags
    /// participate in `B(tag_id)`; the engine never resolves a
    /// `System*` tag to a bitmap.
    pub fn is_filterable(self) -> bool {
        matches!(self, TagType::User)
    }
}
