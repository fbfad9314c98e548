//! The §6 JSON wire format: query and mutation request/response shapes
//! any RPC layer can serialize directly, plus conversions to/from the
//! internal [`NameQuery`]/[`CardMutation`]/[`ResultSet`] types. Nothing
//! in this module touches `TagId`/`Position` — external collaborators
//! only ever see opaque strings, per the data model's "opaque
//! identifier" invariant (§3, §9).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tagengine_core::{
    CardExtId, CardMutation, Deadline, QueryOptions, ResultSet, TagExtId, WorkspaceId,
};
use tagengine_engine::{Introspection, NameQuery};

/// The `{ workspace, intersection, union, exclusion, limit, deadline_ms
/// }` query request (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub workspace: String,
    #[serde(default)]
    pub intersection: Vec<String>,
    #[serde(default)]
    pub union: Vec<String>,
    #[serde(default)]
    pub exclusion: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl QueryRequest {
    /// Split into the workspace id, a resolvable [`NameQuery`], and
    /// [`QueryOptions`] carrying the deadline (if any). No cancellation
    /// token is carried over the wire; a transport layer that wants
    /// cancellation attaches its own token after deserializing.
    pub fn into_parts(self) -> (WorkspaceId, NameQuery, QueryOptions) {
        let workspace = WorkspaceId::new(self.workspace);
        let names = NameQuery {
            intersection: self.intersection.into_iter().map(TagExtId::new).collect(),
            union: self.union.into_iter().map(TagExtId::new).collect(),
            exclusion: self.exclusion.into_iter().map(TagExtId::new).collect(),
            limit: self.limit,
        };
        let options = QueryOptions {
            deadline: self.deadline_ms.map(|ms| Deadline::after(Duration::from_millis(ms))),
            cancel_token: None,
            bypass_result_cache: false,
        };
        (workspace, names, options)
    }
}

/// The `{ ids, total, truncated, fingerprint }` query response (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub ids: Vec<String>,
    pub total: usize,
    pub truncated: bool,
    pub fingerprint: String,
}

impl From<ResultSet> for QueryResponse {
    fn from(result: ResultSet) -> Self {
        QueryResponse {
            ids: result.ids.iter().map(|id| id.as_str().to_string()).collect(),
            total: result.total,
            truncated: result.truncated,
            fingerprint: result.fingerprint.to_string(),
        }
    }
}

/// One entry of a `{ "mutations": [...] }` batch (§6), tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRequest {
    Upsert {
        card_id: String,
        tags: Vec<String>,
    },
    Delete {
        card_id: String,
    },
    RenameTag {
        old: String,
        new: String,
    },
    DeleteTag {
        name: String,
    },
}

impl From<MutationRequest> for CardMutation {
    fn from(req: MutationRequest) -> Self {
        match req {
            MutationRequest::Upsert { card_id, tags } => CardMutation::UpsertCard {
                card_ext_id: CardExtId::new(card_id),
                tags: tags.into_iter().map(TagExtId::new).collect(),
            },
            MutationRequest::Delete { card_id } => CardMutation::DeleteCard {
                card_ext_id: CardExtId::new(card_id),
            },
            MutationRequest::RenameTag { old, new } => CardMutation::RenameTag {
                old: TagExtId::new(old),
                new: TagExtId::new(new),
            },
            MutationRequest::DeleteTag { name } => CardMutation::DeleteTag {
                tag_ext_name: TagExtId::new(name),
            },
        }
    }
}

/// The `{ workspace, mutations }` batch request (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationBatchRequest {
    pub workspace: String,
    pub mutations: Vec<MutationRequest>,
}

impl MutationBatchRequest {
    /// Split into the workspace id and the resolved mutation batch.
    pub fn into_parts(self) -> (WorkspaceId, Vec<CardMutation>) {
        (
            WorkspaceId::new(self.workspace),
            self.mutations.into_iter().map(CardMutation::from).collect(),
        )
    }
}

/// JSON rendering of `introspect(Handle)` (§6), used by `engine stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub tag_count: usize,
    pub card_count: usize,
    pub bitmap_cache: CacheStatsResponse,
    pub result_cache_entries: usize,
    pub store_tag_count: usize,
    pub store_total_cardinality: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

impl From<Introspection> for IntrospectionResponse {
    fn from(report: Introspection) -> Self {
        IntrospectionResponse {
            tag_count: report.tag_count,
            card_count: report.card_count,
            bitmap_cache: CacheStatsResponse {
                entries: report.bitmap_cache_stats.entries,
                bytes: report.bitmap_cache_stats.bytes,
                hits: report.bitmap_cache_stats.hits,
                misses: report.bitmap_cache_stats.misses,
            },
            result_cache_entries: report.result_cache_entries,
            store_tag_count: report.store_stats.tag_count,
            store_total_cardinality: report.store_stats.total_cardinality,
        }
    }
}
