//! Persisted identity records as the session resolver reads them.
//!
//! Field names follow the stored documents (`_id`, `apikey`, `departmentId`,
//! `personnelApiKey`), so the same structs decode store rows and serialize
//! back to the JSON shape downstream consumers already expect.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::{DepartmentId, UserId};

/// A tenant of the backend.
///
/// Fields the resolver does not interpret live in `profile` and serialize
/// back at the top level, so a resolved department matches the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DepartmentRecord")]
pub struct Department {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: DepartmentId,
    /// Display name of the department.
    pub department: String,
    /// Department-wide API key.
    pub apikey: String,
    /// Sub-units, each holding its own personnel API key.
    pub agencies: Vec<Agency>,
    /// Only active departments are resolved.
    pub active: bool,
    pub cad_bidirectional_enabled: bool,
    /// Remaining profile fields, carried through untouched.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// Stored shape of a department. The store's own record `id` is consumed
/// here so it never lands in the profile.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepartmentRecord {
    #[serde(rename = "_id")]
    id: DepartmentId,
    #[serde(default, rename = "id")]
    _record_id: IgnoredAny,
    #[serde(default)]
    department: String,
    #[serde(default)]
    apikey: String,
    #[serde(default)]
    agencies: Vec<Agency>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    cad_bidirectional_enabled: bool,
    #[serde(flatten)]
    profile: Map<String, Value>,
}

impl From<DepartmentRecord> for Department {
    fn from(record: DepartmentRecord) -> Self {
        Self {
            id: record.id,
            department: record.department,
            apikey: record.apikey,
            agencies: record.agencies,
            active: record.active,
            cad_bidirectional_enabled: record.cad_bidirectional_enabled,
            profile: record.profile,
        }
    }
}

impl Department {
    /// True when any agency carries the given personnel API key.
    pub fn has_personnel_api_key(&self, key: &str) -> bool {
        !key.is_empty()
            && self
                .agencies
                .iter()
                .any(|agency| agency.personnel_api_key == key)
    }
}

/// A sub-unit of a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub personnel_api_key: String,
}

/// A login session created by the sign-in flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque token stored in the session cookie.
    pub token: String,
    /// The user this session belongs to.
    #[serde(default)]
    pub user: UserId,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Owning department; empty or absent for superusers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
    /// Cross-tenant account. Stored as a bool, number or string depending on
    /// which system wrote the record.
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub superuser: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    /// The user's own department, if it is set to a non-empty value.
    pub fn own_department_id(&self) -> Option<&DepartmentId> {
        self.department_id.as_ref().filter(|id| !id.is_empty())
    }
}

/// Accepts `true`, `1`, `"true"` and `"1"` as yes; anything else is no.
fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
        Other(Value),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n == 1,
        Some(Flag::Float(n)) => n == 1.0,
        Some(Flag::Text(s)) => s == "true" || s == "1",
        Some(Flag::Other(_)) | None => false,
    })
}

/// Logging-safe projection of a department.
///
/// Carries only the identifier and whitelisted display fields, never keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentLog {
    #[serde(rename = "_id")]
    pub object_id: DepartmentId,
    pub id: DepartmentId,
    pub department: String,
    pub cad_bidirectional_enabled: bool,
}

impl From<&Department> for DepartmentLog {
    fn from(department: &Department) -> Self {
        Self {
            object_id: department.id.clone(),
            id: department.id.clone(),
            department: department.department.clone(),
            cad_bidirectional_enabled: department.cad_bidirectional_enabled,
        }
    }
}

impl DepartmentLog {
    /// Plain JSON form for structured log fields.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
