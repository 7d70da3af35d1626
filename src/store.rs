//! Single-writer state container for the merged user list

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

use crate::model::User;

struct Inner {
    users: Vec<User>,
    /// Generation of the last applied full reconciliation cycle
    generation: u64,
}

/// Holds the merged user list. The reconciliation engine is the single
/// writer of full snapshots; readers subscribe through a watch channel.
///
/// Overlapping reconciliation cycles may complete out of order under slow
/// networks. Each cycle draws a monotonically increasing generation before
/// it starts fetching, and a snapshot carrying a generation older than the
/// last applied one is discarded.
pub struct UserStore {
    inner: Mutex<Inner>,
    next_generation: AtomicU64,
    tx: watch::Sender<Vec<User>>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            inner: Mutex::new(Inner {
                users: Vec::new(),
                generation: 0,
            }),
            next_generation: AtomicU64::new(0),
            tx,
        }
    }

    /// Draw the generation for a new reconciliation cycle
    pub fn begin_cycle(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replace the user list with a completed cycle's result. Returns
    /// false when the cycle is stale and was discarded.
    pub fn apply(&self, generation: u64, users: Vec<User>) -> bool {
        let mut inner = self.inner.lock().expect("user store poisoned");
        if generation <= inner.generation {
            debug!(
                generation,
                applied = inner.generation,
                "discarding stale reconciliation result"
            );
            return false;
        }
        inner.generation = generation;
        inner.users = users;
        self.tx.send_replace(inner.users.clone());
        true
    }

    /// Get a snapshot of the current user list
    pub fn snapshot(&self) -> Vec<User> {
        self.inner.lock().expect("user store poisoned").users.clone()
    }

    /// Subscribe to snapshots of the user list
    pub fn subscribe(&self) -> watch::Receiver<Vec<User>> {
        self.tx.subscribe()
    }

    /// Find a user by local id
    pub fn get(&self, id: &str) -> Option<User> {
        self.inner
            .lock()
            .expect("user store poisoned")
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    /// Project fields a confirmed mutation is known to have changed onto
    /// one user. Does not consume a generation; the periodic cycle
    /// corrects any remaining drift.
    pub fn update_user<F>(&self, id: &str, mutate: F)
    where
        F: FnOnce(&mut User),
    {
        let mut inner = self.inner.lock().expect("user store poisoned");
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            mutate(user);
            self.tx.send_replace(inner.users.clone());
        }
    }

    /// Replace one user in place (used when an approval moves a record
    /// between origin tables and its local id changes)
    pub fn replace_user(&self, id: &str, replacement: User) {
        let mut inner = self.inner.lock().expect("user store poisoned");
        if let Some(slot) = inner.users.iter_mut().find(|u| u.id == id) {
            *slot = replacement;
            self.tx.send_replace(inner.users.clone());
        }
    }

    /// Drop every user that fails the predicate (used when a connection is
    /// removed and its cached users must go with it)
    pub fn retain<F>(&self, keep: F)
    where
        F: Fn(&User) -> bool,
    {
        let mut inner = self.inner.lock().expect("user store poisoned");
        let before = inner.users.len();
        inner.users.retain(|u| keep(u));
        if inner.users.len() != before {
            self.tx.send_replace(inner.users.clone());
        }
    }
}
