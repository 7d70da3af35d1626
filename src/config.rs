//! Configuration options for the DevHub sync engine

use std::path::PathBuf;
use std::time::Duration;

use crate::approval::Plan;

/// Configuration options for the sync engine
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How often the reconciliation loop polls the remote tables
    pub poll_interval: Duration,

    /// The HTTP request timeout
    pub request_timeout: Duration,

    /// Where the connection registry is persisted between sessions
    pub storage_path: PathBuf,

    /// Default table name for pending registrations
    pub registrations_table: String,

    /// Default table name for active users
    pub users_table: String,

    /// Role written into the active-users row when a registration is approved
    pub default_role: String,

    /// Subscription length granted on approval when none is supplied
    pub default_subscription: Plan,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            storage_path: PathBuf::from("devhub_connections.json"),
            registrations_table: "registrations".to_string(),
            users_table: "users".to_string(),
            default_role: "member".to_string(),
            default_subscription: Plan::Monthly,
        }
    }
}

impl ClientOptions {
    /// Set the reconciliation poll interval
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }

    /// Set the HTTP request timeout
    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the registry persistence path
    pub fn with_storage_path(mut self, value: impl Into<PathBuf>) -> Self {
        self.storage_path = value.into();
        self
    }

    /// Set the default registrations table name
    pub fn with_registrations_table(mut self, value: &str) -> Self {
        self.registrations_table = value.to_string();
        self
    }

    /// Set the default active-users table name
    pub fn with_users_table(mut self, value: &str) -> Self {
        self.users_table = value.to_string();
        self
    }

    /// Set the role assigned to newly approved users
    pub fn with_default_role(mut self, value: &str) -> Self {
        self.default_role = value.to_string();
        self
    }

    /// Set the subscription length granted on approval
    pub fn with_default_subscription(mut self, value: Plan) -> Self {
        self.default_subscription = value;
        self
    }
}
