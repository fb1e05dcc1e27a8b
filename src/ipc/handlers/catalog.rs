use crate::catalog;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::CatalogKind;
use serde_json::json;

fn parse_kind(params: &serde_json::Value) -> Result<CatalogKind, HandlerErr> {
    let raw = get_required_str(params, "kind")?;
    CatalogKind::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params("kind must be one of: degree, stream, batch"))
}

fn handle_catalog_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let kind = parse_kind(&req.params)?;
        let name = get_required_str(&req.params, "name")?;
        let entry = catalog::upsert_entry(
            store,
            principal,
            kind,
            get_optional_str(&req.params, "id"),
            &name,
            get_optional_str(&req.params, "parentId"),
        )?;
        Ok(json!({ "id": entry.id, "name": entry.name, "parentId": entry.parent_id }))
    })
}

fn handle_catalog_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, _principal| {
        let kind = parse_kind(&req.params)?;
        let entries = catalog::list_entries(store, kind)?;
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| json!({ "id": e.id, "name": e.name, "parentId": e.parent_id }))
            .collect();
        Ok(json!({ "kind": kind.label(), "entries": rows }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalog.upsert" => Some(handle_catalog_upsert(state, req)),
        "catalog.list" => Some(handle_catalog_list(state, req)),
        _ => None,
    }
}
