use serde_json::{json, Value};

use crate::error::CoreError;
use crate::ids::parse_list_field;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Principal;
use crate::store::SqliteStore;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        let details = match &e {
            CoreError::PartialFetchFailure { unresolved, .. } => {
                Some(json!({ "unresolved": unresolved }))
            }
            CoreError::UnknownStudents { student_ids, .. } => {
                Some(json!({ "studentIds": student_ids }))
            }
            CoreError::NoMatchingStudents {
                degree_id,
                stream_id,
                batch_id,
            } => Some(json!({
                "degreeId": degree_id,
                "streamId": stream_id,
                "batchId": batch_id
            })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        Self {
            code: "store_error",
            message: format!("{e:#}"),
            details: None,
        }
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Accepts either a JSON array of strings or comma-separated form text.
pub fn get_list_field(params: &Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(parse_list_field(s)),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain strings", key)))
            })
            .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
            .collect(),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be an array or comma-separated string",
            key
        ))),
    }
}

/// Every data method needs a caller identity; absent or malformed means refused.
pub fn parse_principal(params: &Value) -> Result<Principal, HandlerErr> {
    let denied = |message: &str| HandlerErr {
        code: "permission_denied",
        message: message.to_string(),
        details: None,
    };
    let Some(raw) = params.get("principal") else {
        return Err(denied("missing principal"));
    };
    let principal: Principal =
        serde_json::from_value(raw.clone()).map_err(|e| denied(&format!("bad principal: {}", e)))?;
    if principal.id.trim().is_empty() {
        return Err(denied("principal id is blank"));
    }
    Ok(principal)
}

pub fn with_store<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&SqliteStore, &Principal) -> Result<Value, HandlerErr>,
{
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let principal = match parse_principal(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    match f(store, &principal) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}
