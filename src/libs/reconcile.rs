//! Reconcile-by-key between a remote snapshot and locally stored keys.
//!
//! There is no "deleted since" feed on the remote side, so every sync is a
//! full-snapshot diff: every remote record is upserted, then every local key
//! the snapshot no longer contains is deleted. Both steps are keyed and
//! idempotent, so a sync that fails halfway can simply be run again.

use anyhow::Result;
use std::collections::HashSet;
use std::hash::Hash;

/// Outcome counts of an applied reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub upserted: usize,
    pub deleted: usize,
}

/// The work needed to make local state match a remote snapshot.
#[derive(Debug)]
pub struct Reconciliation<'a, T, K> {
    pub upserts: &'a [T],
    /// Local keys absent from the remote snapshot, in their local order.
    pub deletions: Vec<K>,
}

impl<'a, T, K> Reconciliation<'a, T, K>
where
    K: Eq + Hash + Clone,
{
    pub fn between<L, F>(local_keys: L, remote: &'a [T], key: F) -> Self
    where
        L: IntoIterator<Item = K>,
        F: Fn(&T) -> K,
    {
        let mut leftover: HashSet<K> = HashSet::new();
        let mut deletions = Vec::new();
        for local in local_keys {
            if leftover.insert(local.clone()) {
                deletions.push(local);
            }
        }

        for record in remote {
            leftover.remove(&key(record));
        }
        deletions.retain(|local| leftover.contains(local));

        Self { upserts: remote, deletions }
    }

    pub fn is_noop(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }

    /// Applies every upsert, then every deletion, against `store`.
    ///
    /// Stops at the first failure; whatever was applied before it stays applied.
    pub fn apply<S, U, D>(self, store: &mut S, mut upsert: U, mut delete: D) -> Result<SyncReport>
    where
        U: FnMut(&mut S, &T) -> Result<()>,
        D: FnMut(&mut S, &K) -> Result<()>,
    {
        let mut report = SyncReport::default();
        for record in self.upserts {
            upsert(store, record)?;
            report.upserted += 1;
        }
        for local in &self.deletions {
            delete(store, local)?;
            report.deleted += 1;
        }
        Ok(report)
    }
}
