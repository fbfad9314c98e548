//! # tagengine-api
//!
//! The library-first facade (§6): [`Config`]/[`Engine`]/[`Handle`] wrap
//! `tagengine-engine`'s [`tagengine_engine::WorkspaceEngine`] behind the
//! in-process contract the specification names —
//! `open_workspace`/`ingest_batch`/`query`/`introspect`/`purge` — and
//! [`wire`] gives any RPC layer wrapping the engine the JSON request/
//! response shapes from §6 without that layer ever touching internal
//! `TagId`/`Position` types.
//!
//! Internal crates (`storage`, `catalog`, `cache`, `engine`) are not
//! re-exported; only this crate's surface is the stable embedding point,
//! the same split the teacher draws between its `substrate`/`facade`
//! layers and the rest of the workspace.

mod config;
mod handle;
pub mod wire;

pub use config::Config;
pub use handle::{Engine, Handle};

// Re-exported so callers can build queries/mutations without a direct
// dependency on `tagengine-core` or `tagengine-engine`.
pub use tagengine_core::{
    CardExtId, CardMutation, CancelToken, Deadline, EngineError, EngineResult, Fingerprint,
    QueryOptions, ResultSet, TagExtId, TagType, WorkspaceId,
};
pub use tagengine_engine::{Introspection, MutationPlan, NameQuery, StoreStats};
