//! DevHub Sync Engine
//!
//! A reconciliation and approval engine for end-user registrations held
//! in externally hosted Supabase/PostgREST-backed applications. It polls
//! each configured application's pending-registrations and active-users
//! tables, merges the rows into one canonical user list de-duplicated by
//! email, and applies operator decisions (approve, reject, extend
//! subscription) as remote mutations followed by local projection.

pub mod approval;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mapper;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod store;
pub mod table;

use std::sync::Arc;

use reqwest::Client;

use crate::approval::ApprovalWorkflow;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::model::ConnectionDescriptor;
use crate::reconcile::ReconcileEngine;
use crate::registry::ConnectionRegistry;
use crate::store::UserStore;
use crate::table::TableClient;

/// The main entry point for the DevHub sync engine
pub struct DevHub {
    /// HTTP client shared by all remote table access
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    /// The persisted registry of connected applications
    registry: Arc<ConnectionRegistry>,
    /// The merged user list
    store: Arc<UserStore>,
}

impl DevHub {
    /// Create a new engine with default options
    ///
    /// # Example
    ///
    /// ```no_run
    /// use devhub_sync::DevHub;
    ///
    /// let hub = DevHub::new();
    /// ```
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    /// Create a new engine with custom options. The connection registry
    /// is reloaded from the configured storage path.
    pub fn with_options(options: ClientOptions) -> Self {
        let http_client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .unwrap_or_default();

        let registry = Arc::new(ConnectionRegistry::load(&options.storage_path));
        let store = Arc::new(UserStore::new());

        Self {
            http_client,
            options,
            registry,
            store,
        }
    }

    /// The registry of connected applications
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The merged user list
    pub fn store(&self) -> &Arc<UserStore> {
        &self.store
    }

    /// Create a TableClient for one of a connection's remote tables
    ///
    /// # Example
    ///
    /// ```no_run
    /// use devhub_sync::DevHub;
    /// use devhub_sync::model::{ConnectionDescriptor, DbKind};
    ///
    /// let hub = DevHub::new();
    /// let desc = ConnectionDescriptor::new("Acme", "Acme SaaS", DbKind::Supabase)
    ///     .with_db_host("db.abcdefgh.supabase.co")
    ///     .with_api_key("sk_live_key");
    /// let registrations = hub.table(&desc, "registrations").unwrap();
    /// ```
    pub fn table(&self, descriptor: &ConnectionDescriptor, table: &str) -> Result<TableClient, Error> {
        TableClient::for_descriptor(descriptor, table, self.http_client.clone())
    }

    /// Create the reconciliation engine
    pub fn engine(&self) -> ReconcileEngine {
        ReconcileEngine::new(
            self.http_client.clone(),
            self.registry.clone(),
            self.store.clone(),
            self.options.clone(),
        )
    }

    /// Create the approval workflow
    pub fn approvals(&self) -> ApprovalWorkflow {
        ApprovalWorkflow::new(
            self.http_client.clone(),
            self.registry.clone(),
            self.store.clone(),
            self.options.clone(),
        )
    }

    /// Remove a connection, cascading to drop its cached users from the
    /// merged list
    pub fn remove_connection(&self, id: &str) -> Result<Option<ConnectionDescriptor>, Error> {
        let removed = self.registry.remove(id)?;
        if removed.is_some() {
            self.store.retain(|u| u.source_app_id != id);
        }
        Ok(removed)
    }
}

impl Default for DevHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::approval::{ApprovalWorkflow, Plan};
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::model::{ConnectionDescriptor, DbKind, OriginTable, User, UserStatus};
    pub use crate::reconcile::ReconcileEngine;
    pub use crate::DevHub;
}
