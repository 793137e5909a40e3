//! Response documents returned by the managed delivery API.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::delivery::DeliveryResource;

/// Comparison status of a single managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiffStatus {
    /// Desired and current state are identical.
    NoDiff,
    /// The resource does not exist yet.
    Missing,
    /// The resource exists and differs.
    Diff,
    /// The resource would be created.
    Create,
    /// The resource would be updated.
    Update,
    /// The platform failed to compare the resource.
    Error,
    /// A status this crate does not know about.
    Other(String),
}

impl DiffStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoDiff => "NO_DIFF",
            Self::Missing => "MISSING",
            Self::Diff => "DIFF",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Error => "ERROR",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for DiffStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NO_DIFF" => Self::NoDiff,
            "MISSING" => Self::Missing,
            "DIFF" => Self::Diff,
            "CREATE" => Self::Create,
            "UPDATE" => Self::Update,
            "ERROR" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<DiffStatus> for String {
    fn from(value: DiffStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field-level difference between current and desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Change state reported for the field.
    #[serde(default)]
    pub state: String,
    /// Desired value.
    #[serde(default)]
    pub desired: String,
    /// Current value.
    #[serde(default)]
    pub current: String,
}

/// Comparison result for one managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceDiff {
    /// Comparison status.
    pub status: DiffStatus,
    /// Platform resource identifier, colon delimited.
    #[serde(default)]
    pub resource_id: String,
    /// The desired resource.
    #[serde(default)]
    pub resource: DeliveryResource,
    /// Field-level differences keyed by field path.
    #[serde(default, rename = "diff")]
    pub diffs: BTreeMap<String, ResourceDiff>,
}

impl ManagedResourceDiff {
    /// Returns true if the resource differs from its desired state.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.status != DiffStatus::NoDiff
    }
}

/// One account's batch in a diff response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDiffs {
    /// Resource diffs in the batch.
    #[serde(default)]
    pub resource_diffs: Vec<ManagedResourceDiff>,
}

/// Orders resource IDs so diffs of the same resource family stay together.
///
/// IDs are colon delimited (`cluster:test:myapp`). Two IDs of the same family
/// (first segment) that both have a third segment are ordered by that
/// segment, then by the full ID. Everything else is ordered by the full ID.
/// A family's IDs with fewer than three segments sort after the rest of
/// that family.
#[must_use]
pub fn compare_resource_ids(a: &str, b: &str) -> Ordering {
    resource_id_sort_key(a).cmp(&resource_id_sort_key(b))
}

/// `(family prefix, third segment, id)` for IDs with a third segment, where
/// the prefix keeps its trailing colon so it orders against other IDs the
/// same way every member of the family does. Other IDs key on themselves.
fn resource_id_sort_key(id: &str) -> (&str, &str, &str) {
    let mut segments = id.split(':');
    let family = segments.next().unwrap_or_default();
    match (segments.next(), segments.next()) {
        (Some(_), Some(third)) => (&id[..=family.len()], third, id),
        _ => (id, "", id),
    }
}

/// Flattens per-account diff batches into a single, deterministically ordered
/// list.
#[must_use]
pub fn flatten_diffs(batches: Vec<AccountDiffs>) -> Vec<ManagedResourceDiff> {
    let mut diffs: Vec<ManagedResourceDiff> = batches
        .into_iter()
        .flat_map(|batch| batch.resource_diffs)
        .collect();
    diffs.sort_by(|a, b| compare_resource_ids(&a.resource_id, &b.resource_id));
    diffs
}

/// Error document returned when publishing is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishError {
    /// Epoch milliseconds of the failure.
    #[serde(default)]
    pub timestamp: i64,
    /// HTTP status.
    #[serde(default)]
    pub status: i64,
    /// Error class.
    #[serde(default)]
    pub error: String,
    /// Top-level message.
    #[serde(default)]
    pub message: String,
    /// Embedded error from the downstream service.
    #[serde(default, deserialize_with = "deserialize_embedded_body")]
    pub body: PublishErrorBody,
    /// Request URL.
    #[serde(default)]
    pub url: String,
}

/// Embedded error message inside a [`PublishError`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishErrorBody {
    /// Downstream message.
    #[serde(default)]
    pub message: String,
    /// Downstream timestamp.
    #[serde(default)]
    pub timestamp: String,
    /// Downstream status.
    #[serde(default)]
    pub status: i64,
    /// Downstream error class.
    #[serde(default)]
    pub error: String,
}

/// The body arrives as escaped JSON inside a string. Plain objects are
/// accepted too, and non-JSON text becomes the message.
fn deserialize_embedded_body<'de, D>(deserializer: D) -> Result<PublishErrorBody, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Embedded {
        Text(String),
        Object(PublishErrorBody),
    }

    match Option::<Embedded>::deserialize(deserializer)? {
        None => Ok(PublishErrorBody::default()),
        Some(Embedded::Object(body)) => Ok(body),
        Some(Embedded::Text(text)) if text.trim().is_empty() => Ok(PublishErrorBody::default()),
        Some(Embedded::Text(text)) => Ok(serde_json::from_str(&text).unwrap_or_else(|_| PublishErrorBody {
            message: text,
            ..PublishErrorBody::default()
        })),
    }
}

impl PublishError {
    /// Returns the most specific message available.
    #[must_use]
    pub fn message(&self) -> &str {
        if self.body.message.is_empty() {
            &self.message
        } else {
            &self.body.message
        }
    }
}

/// Validation failure detail from the validate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorDetail {
    /// Error kind.
    #[serde(default)]
    pub error: String,
    /// HTTP status.
    #[serde(default)]
    pub status: u16,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Path of the offending node.
    #[serde(default)]
    pub path_expression: String,
    /// Line of the offending node.
    #[serde(default)]
    pub line: Option<u64>,
    /// Column of the offending node.
    #[serde(default)]
    pub column: Option<u64>,
}

impl fmt::Display for ValidationErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error, self.message)?;
        if !self.path_expression.is_empty() {
            write!(f, " at {}", self.path_expression)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line {line}")?;
            if let Some(column) = self.column {
                write!(f, ", column {column}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// What the platform intends to do for every resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuationPlan {
    /// Application name.
    #[serde(default)]
    pub application: String,
    /// When the plan was computed.
    pub updated_at: DateTime<Utc>,
    /// Plans per environment.
    #[serde(default)]
    pub environment_plans: Vec<EnvironmentPlan>,
    /// Errors preventing a full plan.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Planned actions for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPlan {
    /// Environment name.
    pub environment: String,
    /// Resource plans.
    #[serde(default)]
    pub resource_plans: Vec<ResourcePlan>,
}

/// Planned action for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePlan {
    /// Environment name.
    #[serde(default)]
    pub environment: String,
    /// Platform resource identifier.
    pub resource_id: String,
    /// Name shown to users.
    #[serde(default)]
    pub resource_display_name: String,
    /// Whether the platform manages this resource.
    #[serde(default)]
    pub is_managed: bool,
    /// Whether management is paused.
    #[serde(default)]
    pub is_paused: bool,
    /// Planned action, `NONE` when nothing changes.
    #[serde(default)]
    pub action: String,
    /// Field-level changes.
    #[serde(default)]
    pub diff: BTreeMap<String, PlannedChange>,
}

/// Field-level change within a [`ResourcePlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChange {
    /// `ADDED`, `CHANGED` or `REMOVED`.
    #[serde(rename = "type")]
    pub change_type: String,
    /// Desired value.
    #[serde(default)]
    pub desired: String,
    /// Current value.
    #[serde(default)]
    pub current: String,
}

impl ResourcePlan {
    /// Returns true if the platform will act on this resource.
    #[must_use]
    pub fn has_action(&self) -> bool {
        !self.is_paused && self.action != "NONE"
    }
}
