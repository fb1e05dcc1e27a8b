use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::store::{CollectionPath, Document, DocumentStore, MAX_IN_QUERY};

pub const DEFAULT_CHUNK_SIZE: usize = MAX_IN_QUERY;

/// Resolves many ids through id-list reads of at most `chunk_size` ids each.
///
/// Duplicate ids are fetched once. Ids with no stored document are simply absent from
/// the returned map. If any chunk read fails, the whole call fails and reports every id
/// of that chunk and of the chunks after it.
pub fn fetch_many_by_id(
    store: &dyn DocumentStore,
    path: &CollectionPath,
    ids: &[String],
    chunk_size: usize,
) -> CoreResult<BTreeMap<String, Document>> {
    let size = chunk_size.clamp(1, MAX_IN_QUERY);
    let mut seen = HashSet::new();
    let unique: Vec<String> = ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let chunks: Vec<&[String]> = unique.chunks(size).collect();
    let mut out = BTreeMap::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        match store.get_many(path, chunk) {
            Ok(found) => {
                debug!(
                    collection = %path,
                    chunk = idx,
                    requested = chunk.len(),
                    found = found.len(),
                    "fetched chunk"
                );
                out.extend(found);
            }
            Err(source) => {
                let unresolved: Vec<String> =
                    chunks[idx..].iter().flat_map(|c| c.iter().cloned()).collect();
                warn!(
                    collection = %path,
                    chunk = idx,
                    unresolved = unresolved.len(),
                    error = %source,
                    "chunk fetch failed"
                );
                return Err(CoreError::PartialFetchFailure { unresolved, source });
            }
        }
    }
    Ok(out)
}
