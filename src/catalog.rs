use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{encode, CatalogEntry, CatalogKind, Principal};
use crate::store::{DocumentStore, WriteMode};

/// Human-readable names of a cohort's degree, stream and batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortNames {
    pub degree: String,
    pub stream: String,
    pub batch: String,
}

pub fn get_entry(store: &dyn DocumentStore, kind: CatalogKind, id: &str) -> CoreResult<Option<CatalogEntry>> {
    let Some(doc) = store.get(&kind.collection(), id)? else {
        return Ok(None);
    };
    Ok(Some(CatalogEntry::from_document(kind, id, doc)?))
}

pub fn list_entries(store: &dyn DocumentStore, kind: CatalogKind) -> CoreResult<Vec<CatalogEntry>> {
    let rows = store.query(&kind.collection(), &[])?;
    let mut out = rows
        .into_iter()
        .map(|(id, doc)| CatalogEntry::from_document(kind, &id, doc))
        .collect::<Result<Vec<_>, _>>()?;
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(out)
}

/// Creates or renames a catalog entry. A missing id gets a fresh uuid.
pub fn upsert_entry(
    store: &dyn DocumentStore,
    principal: &Principal,
    kind: CatalogKind,
    id: Option<&str>,
    name: &str,
    parent_id: Option<&str>,
) -> CoreResult<CatalogEntry> {
    principal.require_admin("catalog.upsert")?;
    if name.trim().is_empty() {
        return Err(CoreError::InvalidInput(format!("{} name must not be blank", kind.label())));
    }
    let id = match id {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    let entry = CatalogEntry {
        id: id.clone(),
        name: name.to_string(),
        parent_id: parent_id.map(|s| s.to_string()),
    };
    store.upsert(&kind.collection(), &id, encode(&entry)?, WriteMode::Replace)?;
    info!(kind = kind.label(), id = %id, "catalog entry saved");
    Ok(entry)
}

fn require_name(store: &dyn DocumentStore, kind: CatalogKind, id: &str) -> CoreResult<String> {
    match get_entry(store, kind, id)? {
        Some(entry) => Ok(entry.name),
        None => Err(CoreError::UnknownCatalogEntry {
            kind: kind.label(),
            id: id.to_string(),
        }),
    }
}

pub fn resolve_cohort_names(
    store: &dyn DocumentStore,
    degree_id: &str,
    stream_id: &str,
    batch_id: &str,
) -> CoreResult<CohortNames> {
    Ok(CohortNames {
        degree: require_name(store, CatalogKind::Degree, degree_id)?,
        stream: require_name(store, CatalogKind::Stream, stream_id)?,
        batch: require_name(store, CatalogKind::Batch, batch_id)?,
    })
}
