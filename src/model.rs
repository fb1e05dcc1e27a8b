//! Typed records for every stored entity, and the decode/encode edge between them and
//! raw store documents.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::store::{CollectionPath, Document, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

/// Identity of the caller, supplied by the auth layer on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    fn has_identity(&self) -> bool {
        !self.id.trim().is_empty()
    }

    pub fn require_admin(&self, action: &'static str) -> CoreResult<()> {
        if self.has_identity() && self.role == Role::Admin {
            return Ok(());
        }
        Err(CoreError::PermissionDenied {
            action,
            required: "admin",
        })
    }

    pub fn require_staff(&self, action: &'static str) -> CoreResult<()> {
        if self.has_identity() && matches!(self.role, Role::Admin | Role::Teacher) {
            return Ok(());
        }
        Err(CoreError::PermissionDenied {
            action,
            required: "admin or teacher",
        })
    }

    pub fn require_self_or_staff(&self, student_id: &str, action: &'static str) -> CoreResult<()> {
        if self.has_identity() && (self.role != Role::Student || self.id == student_id) {
            return Ok(());
        }
        Err(CoreError::PermissionDenied {
            action,
            required: "admin, teacher or the student themselves",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Degree,
    Stream,
    Batch,
}

impl CatalogKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "degree" => Some(Self::Degree),
            "stream" => Some(Self::Stream),
            "batch" => Some(Self::Batch),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Degree => "degree",
            Self::Stream => "stream",
            Self::Batch => "batch",
        }
    }

    pub fn collection(self) -> CollectionPath {
        match self {
            Self::Degree => CollectionPath::new("degrees"),
            Self::Stream => CollectionPath::new("streams"),
            Self::Batch => CollectionPath::new("batches"),
        }
    }
}

/// A degree, stream or batch with its human-readable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    /// Streams point at their degree; unused for the other kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub reg_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub degree_id: String,
    pub stream_id: String,
    pub batch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterGroup {
    pub group_id: String,
    pub degree_id: String,
    pub stream_id: String,
    pub batch_id: String,
    pub semester_no: u32,
    pub section: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub labs: Vec<String>,
    /// Membership only grows; provisioning unions new ids in.
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSemesterRecord {
    pub semester_no: u32,
    pub section: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub labs: Vec<String>,
    #[serde(default)]
    pub room: String,
    // Serialized even when None so a merge clears a stale value.
    #[serde(default)]
    pub sgpa: Option<f64>,
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub date: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub present: Vec<String>,
    #[serde(default)]
    pub absent: Vec<String>,
    #[serde(default)]
    pub marked_by: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Decodes a stored document, rejecting anything that does not fit `T`.
pub fn decode<T: DeserializeOwned>(path: &CollectionPath, id: &str, doc: Document) -> StoreResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Malformed {
        path: path.to_string(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

pub fn encode<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed {
            path: String::new(),
            id: String::new(),
            reason: format!("expected an object, got {}", other),
        }),
    }
}

impl CatalogEntry {
    pub fn from_document(kind: CatalogKind, id: &str, doc: Document) -> StoreResult<Self> {
        let mut entry: Self = decode(&kind.collection(), id, doc)?;
        entry.id = id.to_string();
        Ok(entry)
    }
}

impl StudentProfile {
    pub fn from_document(id: &str, doc: Document) -> StoreResult<Self> {
        let mut profile: Self = decode(&CollectionPath::students(), id, doc)?;
        profile.id = id.to_string();
        Ok(profile)
    }
}
