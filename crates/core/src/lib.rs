//! # tagengine-core
//!
//! Shared domain types for the tag filter engine: opaque identifiers,
//! the dense position/tag-id newtypes used by the bitmap index, the
//! query/result shapes the planner and the wire layer both speak, and
//! the unified [`EngineError`] taxonomy.
//!
//! This crate has no knowledge of bitmaps, storage, or caching — it only
//! defines the vocabulary every other `tagengine-*` crate shares, the way
//! the teacher's own `core` crate is the dependency root for its
//! `storage`/`concurrency`/`engine` layers.

#![warn(missing_docs)]

mod cancel;
mod error;
mod ids;
mod mutation;
mod query;
mod result;
mod tag;

pub use cancel::{CancelToken, Deadline};
pub use error::{EngineError, EngineResult};
pub use ids::{CardExtId, Fingerprint, Position, TagExtId, TagId, WorkspaceId, LIVE_TAG_ID};
pub use mutation::CardMutation;
pub use query::{Query, QueryOptions};
pub use result::ResultSet;
pub use tag::TagType;
