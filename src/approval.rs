//! Operator-driven status transitions: approve, reject, extend
//!
//! Mutations are two-phase: the remote write happens first and is
//! awaited; only on success are the fields that write is known to have
//! changed projected into the local store. The periodic reconciliation
//! pass corrects any remaining drift.

use std::sync::Arc;

use chrono::{DateTime, Days, Months, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::model::{ConnectionDescriptor, OriginTable, User, UserStatus};
use crate::registry::ConnectionRegistry;
use crate::store::UserStore;
use crate::table::TableClient;

/// Subscription increment selectable by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Weekly,
    Monthly,
    Yearly,
}

impl Plan {
    /// Add this increment to a base date, calendar-aware: month and year
    /// arithmetic clamps to the last valid day (Jan 31 + 1 month lands in
    /// late February, never an invalid Feb 31)
    pub fn extend_from(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Plan::Weekly => base.checked_add_days(Days::new(7)),
            Plan::Monthly => base.checked_add_months(Months::new(1)),
            Plan::Yearly => base.checked_add_months(Months::new(12)),
        }
        .unwrap_or(base)
    }
}

/// Compute a new subscription expiry. An absent or already-lapsed expiry
/// extends from `now`, not from the stale date, so past lapses do not
/// compound.
pub fn extend_expiry(
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    plan: Plan,
) -> DateTime<Utc> {
    let base = match current {
        Some(end) if end > now => end,
        _ => now,
    };
    plan.extend_from(base)
}

/// Outcome of one user within a bulk approval
pub struct ApprovalOutcome {
    pub user_id: String,
    pub email: String,
    pub result: Result<(), Error>,
}

/// Applies operator decisions as remote mutations plus local projection
pub struct ApprovalWorkflow {
    http: Client,
    registry: Arc<ConnectionRegistry>,
    store: Arc<UserStore>,
    options: ClientOptions,
}

impl ApprovalWorkflow {
    /// Create a new workflow
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
            options,
        }
    }

    /// Approve a pending registration: insert a new active-users row,
    /// then delete the originating registration row.
    ///
    /// If the insert fails the registration is left untouched and the
    /// error is returned. If the delete fails after a successful insert,
    /// the result is [`Error::PartialMutation`]: both rows exist remotely
    /// and no compensating rollback is attempted.
    pub async fn approve(&self, user_id: &str) -> Result<(), Error> {
        let user = self.lookup(user_id, OriginTable::Registrations)?;
        let descriptor = self.descriptor_for(&user)?;

        let active_table =
            TableClient::for_descriptor(&descriptor, &descriptor.users_table, self.http.clone())?;
        let registration_table = TableClient::for_descriptor(
            &descriptor,
            &descriptor.registrations_table,
            self.http.clone(),
        )?;

        let now = Utc::now();
        let expiry = user
            .subscription_end
            .unwrap_or_else(|| self.options.default_subscription.extend_from(now));
        let new_remote_id = Uuid::new_v4().to_string();

        active_table
            .insert(json!({
                "id": new_remote_id.clone(),
                "full_name": user.name.clone(),
                "email": user.email.clone(),
                "phone": user.phone.clone(),
                "role": self.options.default_role.clone(),
                "subscription_expiry": expiry.to_rfc3339(),
                "updated_at": now.to_rfc3339(),
            }))
            .execute()
            .await?;

        if let Err(err) = registration_table
            .delete()
            .eq("id", &user.remote_id)
            .execute()
            .await
        {
            warn!(email = %user.email, %err, "approved user but registration row was not removed");
            return Err(Error::partial_mutation(format!(
                "inserted active user {} but failed to delete registration {}: {}",
                user.email, user.remote_id, err
            )));
        }

        info!(email = %user.email, "registration approved");
        let local_id = user.id.clone();
        self.store.replace_user(
            &local_id,
            User {
                id: format!("{}-{}", OriginTable::Users.id_prefix(), new_remote_id),
                remote_id: new_remote_id,
                origin: OriginTable::Users,
                status: UserStatus::Active,
                subscription_end: Some(expiry),
                last_active: Some(now),
                ..user
            },
        );
        Ok(())
    }

    /// Reject a pending registration: patch its status column in place.
    /// No row movement.
    pub async fn reject(&self, user_id: &str) -> Result<(), Error> {
        let user = self.lookup(user_id, OriginTable::Registrations)?;
        let descriptor = self.descriptor_for(&user)?;

        let registration_table = TableClient::for_descriptor(
            &descriptor,
            &descriptor.registrations_table,
            self.http.clone(),
        )?;

        registration_table
            .patch(json!({ "status": "rejected" }))
            .eq("id", &user.remote_id)
            .execute()
            .await?;

        info!(email = %user.email, "registration rejected");
        self.store
            .update_user(&user.id, |u| u.status = UserStatus::Suspended);
        Ok(())
    }

    /// Extend an active user's subscription by one plan increment.
    ///
    /// The active-users row is matched on email, not id, since ids differ
    /// across the two remote tables.
    pub async fn extend_subscription(&self, user_id: &str, plan: Plan) -> Result<(), Error> {
        let user = self.lookup(user_id, OriginTable::Users)?;
        let descriptor = self.descriptor_for(&user)?;

        let active_table =
            TableClient::for_descriptor(&descriptor, &descriptor.users_table, self.http.clone())?;

        let new_end = extend_expiry(user.subscription_end, Utc::now(), plan);

        active_table
            .patch(json!({ "subscription_expiry": new_end.to_rfc3339() }))
            .eq("email", &user.email)
            .execute()
            .await?;

        info!(email = %user.email, until = %new_end, "subscription extended");
        self.store.update_user(&user.id, |u| {
            u.subscription_end = Some(new_end);
            u.status = UserStatus::Active;
        });
        Ok(())
    }

    /// Approve every currently pending registration, sequentially. One
    /// failure does not block the rest; each user's outcome is reported.
    pub async fn approve_all_pending(&self) -> Vec<ApprovalOutcome> {
        let pending: Vec<User> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|u| u.origin == OriginTable::Registrations && u.status == UserStatus::Pending)
            .collect();

        let mut outcomes = Vec::with_capacity(pending.len());
        for user in pending {
            let result = self.approve(&user.id).await;
            if let Err(err) = &result {
                warn!(email = %user.email, %err, "bulk approval: user skipped");
            }
            outcomes.push(ApprovalOutcome {
                user_id: user.id,
                email: user.email,
                result,
            });
        }
        outcomes
    }

    fn lookup(&self, user_id: &str, expected: OriginTable) -> Result<User, Error> {
        let user = self
            .store
            .get(user_id)
            .ok_or_else(|| Error::config_invalid(format!("unknown user '{}'", user_id)))?;
        if user.origin != expected {
            return Err(Error::config_invalid(format!(
                "user '{}' does not originate from the {:?} table",
                user_id, expected
            )));
        }
        Ok(user)
    }

    fn descriptor_for(&self, user: &User) -> Result<ConnectionDescriptor, Error> {
        self.registry.get(&user.source_app_id).ok_or_else(|| {
            Error::config_invalid(format!(
                "user '{}' belongs to an unknown connection",
                user.id
            ))
        })
    }
}
