//! # tagengine-storage
//!
//! The Bitmap Store (§4.1): durable, workspace-scoped persistence of one
//! compressed bitmap per `(workspace_id, tag_id)`, plus a small fixed-size
//! header carrying cardinality, version, and last-updated time.
//!
//! Two implementations share the [`BitmapStore`] trait:
//! - [`FileBitmapStore`] — one file per `(workspace, tag)` under a data
//!   directory, written via write-temp-then-rename for atomicity.
//! - [`MemBitmapStore`] — a [`dashmap::DashMap`]-backed in-memory store,
//!   for tests and for embedding without a filesystem.

#![warn(missing_docs)]

pub mod header;
mod mem_store;
mod store;

#[cfg(not(target_arch = "wasm32"))]
mod file_store;

pub use header::{BitmapHeader, HEADER_SIZE};
pub use mem_store::MemBitmapStore;
pub use store::{BitmapRecord, BitmapStore};

#[cfg(not(target_arch = "wasm32"))]
pub use file_store::{workspace_dir_name, FileBitmapStore};
