//! # tagengine
//!
//! A workspace-isolated Tag Filter Engine: a compressed bitmap index
//! over AND/OR/NOT spatial queries, built to answer "which cards carry
//! every tag in `I`, at least one tag in `O`, and no tag in `X`?" in
//! sub-millisecond time over hundreds of thousands to millions of
//! cards.
//!
//! # Quick Start
//!
//! ```
//! use tagengine::{CardMutation, Config, Engine, NameQuery, QueryOptions, TagExtId, CardExtId};
//!
//! # fn main() -> tagengine::EngineResult<()> {
//! let engine = Engine::open(Config::in_memory())?;
//! let workspace = engine.open_workspace("w1")?;
//!
//! workspace.ingest_batch(&[CardMutation::UpsertCard {
//!     card_ext_id: CardExtId::new("c1"),
//!     tags: vec![TagExtId::new("red"), TagExtId::new("small")],
//! }])?;
//!
//! let result = workspace.query(
//!     &NameQuery { intersection: vec![TagExtId::new("red")], ..Default::default() },
//!     &QueryOptions::default(),
//! )?;
//! assert_eq!(result.total, 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Five cooperating components, leaves-first: the Bitmap Store (durable
//! `tag_id -> compressed bitmap`), the Tag/Card Catalog (opaque id <->
//! dense position/tag-id bijection), the Bitmap Cache (decoded-bitmap
//! LRU), the Query Planner & Executor (the AND/OR/NOT algebra), and the
//! Result Cache & Index Writer (fingerprinted result memoization plus
//! atomic mutation application). [`Engine`] and [`Handle`] are the only
//! stable entry points; the crates behind them (`storage`, `catalog`,
//! `cache`, `engine`) are implementation detail.

pub use tagengine_api::*;
