//! # tagengine-catalog
//!
//! The Tag/Card Catalog (§4.2): per-workspace interning of external
//! opaque ids into dense internal positions and tag ids, plus the
//! `Live_W` bitmap of non-tombstoned card positions. Persistence is an
//! append-only, crash-tolerant log (see [`log`]) replayed on open.

mod catalog;
mod log;
mod record;

pub use catalog::Catalog;
pub use log::AppendLog;
pub use record::{CardRecord, TagRecord};
