//! Canonical query fingerprinting (§4.5): `H(W, sorted(I), sorted(O),
//! sorted(X), limit, sorted(observed_versions))`.

use tagengine_core::{Fingerprint, Query, TagId, WorkspaceId};
use xxhash_rust::xxh3::Xxh3;

/// Compute the canonical fingerprint for `query` against `workspace`,
/// given the `(tag_id, version)` pairs actually observed while building
/// the plan (step 2 of §4.4). `observed_versions` need not be
/// pre-sorted; this function sorts a local copy.
pub fn compute(
    workspace: &WorkspaceId,
    query: &Query,
    observed_versions: &[(TagId, u64)],
) -> Fingerprint {
    let mut hasher = Xxh3::new();
    hasher.update(workspace.as_str().as_bytes());
    hasher.update(b"\0");

    write_tag_set(&mut hasher, query.intersection.iter().copied());
    write_tag_set(&mut hasher, query.union.iter().copied());
    write_tag_set(&mut hasher, query.exclusion.iter().copied());

    match query.limit {
        Some(limit) => hasher.update(&(limit as u64).to_le_bytes()),
        None => hasher.update(&u64::MAX.to_le_bytes()),
    }

    let mut versions: Vec<(TagId, u64)> = observed_versions.to_vec();
    versions.sort_unstable_by_key(|(tag_id, _)| tag_id.value());
    for (tag_id, version) in versions {
        hasher.update(&tag_id.value().to_le_bytes());
        hasher.update(&version.to_le_bytes());
    }

    Fingerprint(hasher.digest())
}

fn write_tag_set(hasher: &mut Xxh3, tags: impl Iterator<Item = TagId>) {
    // `Query`'s sets are `BTreeSet`, so iteration order is already
    // ascending by `tag_id` — identical queries always hash identically.
    let mut count: u32 = 0;
    let mut buf = Vec::new();
    for tag_id in tags {
        buf.extend_from_slice(&tag_id.value().to_le_bytes());
        count += 1;
    }
    hasher.update(&count.to_le_bytes());
    hasher.update(&buf);
}
