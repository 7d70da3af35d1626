//! Canonical data contracts shared across the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Database flavor behind a connected application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    Postgres,
    Mysql,
    Supabase,
}

/// Last-known reachability of a connected application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Which remote table a canonical user was derived from. Determines the
/// mutation path the approval workflow uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginTable {
    Registrations,
    Users,
}

impl OriginTable {
    /// Prefix used to namespace local ids so records from the two tables
    /// cannot collide
    pub fn id_prefix(&self) -> &'static str {
        match self {
            OriginTable::Registrations => "REG",
            OriginTable::Users => "USR",
        }
    }
}

/// Canonical user status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Suspended,
}

/// Subscription tier reported by the source application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Enterprise,
}

/// Locally stored configuration for one externally monitored application.
///
/// A descriptor with no API key or no resolvable base URL cannot
/// participate in reconciliation and is silently skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub db_kind: DbKind,

    /// Host of the form `db.<project-ref>.<provider-domain>`, from which
    /// the REST base URL is derived
    #[serde(default)]
    pub db_host: Option<String>,

    /// Directly supplied REST base URL; takes precedence over `db_host`
    #[serde(default)]
    pub api_url: Option<String>,

    /// Static API key sent as both `apikey` and bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_registrations_table")]
    pub registrations_table: String,

    #[serde(default = "default_users_table")]
    pub users_table: String,

    /// Number of users seen on the last successful sync
    #[serde(default)]
    pub user_count: usize,

    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,

    pub status: ConnectionStatus,
}

fn default_registrations_table() -> String {
    "registrations".to_string()
}

fn default_users_table() -> String {
    "users".to_string()
}

impl ConnectionDescriptor {
    /// Create a new descriptor with a fresh id and default table names
    pub fn new(name: &str, description: &str, db_kind: DbKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            db_kind,
            db_host: None,
            api_url: None,
            api_key: None,
            registrations_table: default_registrations_table(),
            users_table: default_users_table(),
            user_count: 0,
            last_sync: None,
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Set the database host (`db.<ref>.<provider>`)
    pub fn with_db_host(mut self, host: &str) -> Self {
        self.db_host = Some(host.to_string());
        self
    }

    /// Set an explicit REST base URL
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = Some(url.to_string());
        self
    }

    /// Set the static API key
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Resolve the REST base URL. An explicitly configured URL wins; a
    /// host of the form `db.<ref>.<provider>` is reconstructed as
    /// `https://<ref>.<provider>`.
    pub fn base_url(&self) -> Option<String> {
        if let Some(url) = &self.api_url {
            let trimmed = url.trim_end_matches('/');
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }

        let host = self.db_host.as_deref()?;
        let rest = host.strip_prefix("db.")?;
        if rest.is_empty() {
            return None;
        }
        Some(format!("https://{}", rest))
    }

    /// Whether this descriptor can participate in reconciliation
    pub fn is_eligible(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.is_empty()) && self.base_url().is_some()
    }
}

/// Canonical local user record, unifying the shapes of the two remote
/// tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Locally namespaced id, e.g. `REG-7` or `USR-42`
    pub id: String,
    /// Original remote row id, kept for mutation targeting
    pub remote_id: String,
    pub name: String,
    /// Primary natural key for cross-table de-duplication
    pub email: String,
    pub phone: Option<String>,
    pub source_app_id: String,
    pub source_app_name: String,
    pub origin: OriginTable,
    pub status: UserStatus,
    pub tier: SubscriptionTier,
    pub subscription_end: Option<DateTime<Utc>>,
    /// Creation time as reported by the source row; `None` when the row
    /// carried no usable timestamp
    pub registered_at: Option<DateTime<Utc>>,
    /// `None` renders as "Never" at the display layer
    pub last_active: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}
