use crate::config::HubConfig;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{parse_principal, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::MAX_IN_QUERY;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Fetch,
    Attendance,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "fetch" => Some(Self::Fetch),
            "attendance" => Some(Self::Attendance),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Fetch => "setup.fetch",
            Self::Attendance => "setup.attendance",
        }
    }
}

fn default_section(section: SetupSection, config: &HubConfig) -> Value {
    match section {
        SetupSection::Fetch => json!({
            "chunkSize": config.fetch_chunk_size
        }),
        SetupSection::Attendance => json!({
            "percentDecimals": 1
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Fetch => match k.as_str() {
                "chunkSize" => {
                    obj.insert(
                        k.clone(),
                        Value::from(parse_i64_range(v, k, 1, MAX_IN_QUERY as i64)?),
                    );
                }
                _ => return Err(format!("unknown fetch field: {}", k)),
            },
            SetupSection::Attendance => match k.as_str() {
                "percentDecimals" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 4)?));
                }
                _ => return Err(format!("unknown attendance field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(state: &AppState, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section, &state.config);
    let Some(store) = state.store.as_ref() else {
        return Ok(current);
    };
    if let Some(saved) = db::settings_get_json(store.connection(), section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values must not block setup.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Effective id-list chunk size for the open workspace.
pub fn fetch_chunk_size(state: &AppState) -> usize {
    load_section(state, SetupSection::Fetch)
        .ok()
        .and_then(|v| v.get("chunkSize").and_then(|n| n.as_u64()))
        .map(|n| n as usize)
        .unwrap_or(state.config.fetch_chunk_size)
}

pub fn percent_decimals(state: &AppState) -> u32 {
    load_section(state, SetupSection::Attendance)
        .ok()
        .and_then(|v| v.get("percentDecimals").and_then(|n| n.as_u64()))
        .map(|n| n as u32)
        .unwrap_or(1)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    if let Err(e) = parse_principal(&req.params) {
        return e.response(&req.id);
    }
    if let Some(raw) = req.params.get("section").and_then(|v| v.as_str()) {
        let Some(section) = SetupSection::parse(raw) else {
            return err(&req.id, "bad_params", "unknown section", None);
        };
        return match load_section(state, section) {
            Ok(v) => ok(&req.id, v),
            Err(e) => HandlerErr::from(e).response(&req.id),
        };
    }
    let fetch = match load_section(state, SetupSection::Fetch) {
        Ok(v) => v,
        Err(e) => return HandlerErr::from(e).response(&req.id),
    };
    let attendance = match load_section(state, SetupSection::Attendance) {
        Ok(v) => v,
        Err(e) => return HandlerErr::from(e).response(&req.id),
    };

    ok(
        &req.id,
        json!({
            "fetch": fetch,
            "attendance": attendance
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let principal = match parse_principal(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = principal.require_admin("setup.update") {
        return err(&req.id, e.code(), e.to_string(), None);
    }
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(state, section) {
        Ok(v) => v,
        Err(e) => return HandlerErr::from(e).response(&req.id),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::settings_set_json(store.connection(), section.key(), &current) {
        return HandlerErr::from(e).response(&req.id);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
