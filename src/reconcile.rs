//! The reconciliation engine: fetch-and-merge across all connections
//!
//! Each cycle rebuilds the merged user list from scratch. Per connected
//! application the pending-registrations and active-users tables are
//! fetched concurrently, mapped to canonical records, and de-duplicated
//! by email with the active-users side winning.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::ClientOptions;
use crate::error::Error;
use crate::mapper::RecordMapper;
use crate::model::{ConnectionDescriptor, OriginTable, User};
use crate::registry::ConnectionRegistry;
use crate::store::UserStore;
use crate::table::TableClient;

/// Rebuilds the user list from remote state, on demand and on a timer
pub struct ReconcileEngine {
    http: Client,
    registry: Arc<ConnectionRegistry>,
    store: Arc<UserStore>,
    mapper: RecordMapper,
    options: ClientOptions,
}

impl ReconcileEngine {
    /// Create a new engine with the default record mapper
    pub fn new(
        http: Client,
        registry: Arc<ConnectionRegistry>,
        store: Arc<UserStore>,
        options: ClientOptions,
    ) -> Self {
        Self {
            http,
            registry,
            store,
            mapper: RecordMapper::new(),
            options,
        }
    }

    /// Replace the record mapper (custom field maps for drifted schemas)
    pub fn with_mapper(mut self, mapper: RecordMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Run one full reconciliation cycle across all connections.
    ///
    /// An empty registry leaves the current user list untouched rather
    /// than wiping a previously loaded view. A failing connection
    /// contributes zero users and keeps its cached count and status for
    /// the cycle; the remaining connections still reconcile.
    pub async fn reconcile_all(&self) {
        let descriptors = self.registry.list();
        if descriptors.is_empty() {
            debug!("no connections configured, keeping current user list");
            return;
        }

        let generation = self.store.begin_cycle();
        let mut merged: Vec<User> = Vec::new();

        for descriptor in &descriptors {
            if !descriptor.is_eligible() {
                debug!(
                    connection = %descriptor.name,
                    "skipping connection without API key or base URL"
                );
                continue;
            }

            match self.collect(descriptor).await {
                Ok(users) => {
                    if let Err(err) = self.registry.record_sync(&descriptor.id, users.len(), Utc::now()) {
                        warn!(connection = %descriptor.name, %err, "failed to persist sync bookkeeping");
                    }
                    merged.extend(users);
                }
                Err(err) => {
                    warn!(
                        connection = %descriptor.name,
                        %err,
                        "fetch failed, connection contributes nothing this cycle"
                    );
                }
            }
        }

        if !self.store.apply(generation, merged) {
            debug!(generation, "reconciliation result superseded by a newer cycle");
        }
    }

    /// Fetch and merge both tables of one connection
    async fn collect(&self, descriptor: &ConnectionDescriptor) -> Result<Vec<User>, Error> {
        let active_table =
            TableClient::for_descriptor(descriptor, &descriptor.users_table, self.http.clone())?;
        let registration_table = TableClient::for_descriptor(
            descriptor,
            &descriptor.registrations_table,
            self.http.clone(),
        )?;

        let (active_rows, registration_rows) = tokio::join!(
            active_table.select().execute(),
            registration_table
                .select()
                .order("created_at", false)
                .execute(),
        );
        let active_rows = active_rows?;
        let registration_rows = registration_rows?;

        let mut users: Vec<User> = active_rows
            .iter()
            .map(|row| self.mapper.map_row(row, OriginTable::Users, descriptor))
            .collect();

        let active_emails: HashSet<String> = users.iter().map(|u| u.email.clone()).collect();

        // Registrations lose to an active user with the same email. Among
        // registrations themselves the first occurrence wins, which is
        // deterministic under the created_at ordering of the fetch.
        let mut seen_registration_emails = HashSet::new();
        for row in &registration_rows {
            let user = self
                .mapper
                .map_row(row, OriginTable::Registrations, descriptor);
            if active_emails.contains(&user.email) {
                continue;
            }
            if !seen_registration_emails.insert(user.email.clone()) {
                continue;
            }
            users.push(user);
        }

        Ok(users)
    }

    /// Drive the fixed-period poll loop until the shutdown flag flips.
    /// The first tick fires immediately, covering the initial load.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.reconcile_all().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("reconciliation loop stopping");
                        break;
                    }
                }
            }
        }
    }
}
