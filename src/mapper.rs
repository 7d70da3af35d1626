//! Mapping of heterogeneous remote rows into canonical user records
//!
//! Column names vary across schema revisions of the connected
//! applications, so resolution goes through a declarative field map:
//! canonical field name to an ordered list of accepted source columns.
//! New schemas are additive configuration, not code changes.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{ConnectionDescriptor, OriginTable, SubscriptionTier, User, UserStatus};

/// Declarative mapping of canonical fields to accepted source columns,
/// tried in order.
#[derive(Debug, Clone)]
pub struct FieldMap {
    columns: HashMap<String, Vec<String>>,
}

impl Default for FieldMap {
    fn default() -> Self {
        let mut columns = HashMap::new();
        let mut accept = |field: &str, names: &[&str]| {
            columns.insert(
                field.to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            );
        };

        accept("id", &["id", "user_id"]);
        accept("name", &["name", "full_name", "username"]);
        accept("email", &["email"]);
        accept("phone", &["phone_number", "phone", "whatsapp"]);
        accept("status", &["status"]);
        accept("tier", &["subscription_tier"]);
        accept("registered_at", &["created_at"]);
        accept("last_active", &["last_sign_in_at", "updated_at"]);
        accept("subscription_end", &["subscription_end", "subscription_expiry"]);
        accept("reason", &["reason"]);

        Self { columns }
    }
}

impl FieldMap {
    /// Replace the accepted source columns for a canonical field
    pub fn accept(mut self, field: &str, names: &[&str]) -> Self {
        self.columns.insert(
            field.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    /// Resolve a canonical field against a row, returning the first
    /// accepted column that is present and non-null
    pub fn resolve<'a>(&self, row: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
        let names = self.columns.get(field)?;
        names
            .iter()
            .filter_map(|name| row.get(name))
            .find(|value| !value.is_null())
    }
}

/// Converts remote rows into canonical [`User`] records, parameterized by
/// origin table and owning descriptor. Tolerates the absence of any
/// column; missing fields resolve to defined fallbacks.
#[derive(Debug, Clone, Default)]
pub struct RecordMapper {
    fields: FieldMap,
}

impl RecordMapper {
    /// Create a mapper with the default field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper with a custom field map
    pub fn with_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// Map one remote row into a canonical user
    pub fn map_row(
        &self,
        row: &Map<String, Value>,
        origin: OriginTable,
        desc: &ConnectionDescriptor,
    ) -> User {
        let remote_id = self
            .fields
            .resolve(row, "id")
            .and_then(value_to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let name = self
            .fields
            .resolve(row, "name")
            .and_then(value_to_string)
            .unwrap_or_else(|| match origin {
                OriginTable::Registrations => "Unknown Candidate".to_string(),
                OriginTable::Users => "Unknown User".to_string(),
            });

        let email = self
            .fields
            .resolve(row, "email")
            .and_then(value_to_string)
            .unwrap_or_else(|| "no-email".to_string());

        let status = match origin {
            OriginTable::Users => UserStatus::Active,
            OriginTable::Registrations => {
                normalize_status(self.fields.resolve(row, "status").and_then(Value::as_str))
            }
        };

        let tier = self
            .fields
            .resolve(row, "tier")
            .and_then(Value::as_str)
            .map(parse_tier)
            .unwrap_or(SubscriptionTier::Free);

        let registered_at = self
            .fields
            .resolve(row, "registered_at")
            .and_then(parse_timestamp);

        let last_active = self
            .fields
            .resolve(row, "last_active")
            .and_then(parse_timestamp)
            .or(registered_at);

        User {
            id: format!("{}-{}", origin.id_prefix(), remote_id),
            remote_id,
            name,
            email,
            phone: self.fields.resolve(row, "phone").and_then(value_to_string),
            source_app_id: desc.id.clone(),
            source_app_name: desc.name.clone(),
            origin,
            status,
            tier,
            subscription_end: self
                .fields
                .resolve(row, "subscription_end")
                .and_then(parse_timestamp),
            registered_at,
            last_active,
            reason: self.fields.resolve(row, "reason").and_then(value_to_string),
        }
    }
}

/// Normalize the status vocabulary of registration rows
fn normalize_status(raw: Option<&str>) -> UserStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("approved") | Some("active") => UserStatus::Active,
        Some("rejected") | Some("suspended") => UserStatus::Suspended,
        _ => UserStatus::Pending,
    }
}

fn parse_tier(raw: &str) -> SubscriptionTier {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pro" => SubscriptionTier::Pro,
        "enterprise" => SubscriptionTier::Enterprise,
        _ => SubscriptionTier::Free,
    }
}

/// Render a scalar JSON value as a string; ids arrive as numbers from
/// some providers and strings from others
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a remote timestamp, tolerating the formats observed across
/// provider versions: RFC 3339, naive datetime, date-only
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}
