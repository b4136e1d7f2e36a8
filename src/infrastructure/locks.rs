use crate::domain::account::AccountId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

type RowTable = HashMap<AccountId, Arc<RowMutex<()>>>;

/// Table of per-account locks shared by every unit of work of a store.
///
/// Only writers take these locks. Two units of work contend only when they touch the
/// same account, and readers of committed state never wait on them. An entry lives only
/// while some task holds or waits for its row, so ids that are locked once (including
/// ids that turn out not to exist) do not accumulate.
#[derive(Default, Clone)]
pub struct RowLocks {
    rows: Arc<Mutex<RowTable>>,
}

/// Exclusive hold on one account row. Released on drop.
pub struct RowGuard {
    // Field order matters: the row is unlocked before its table entry is reclaimed.
    _guard: OwnedMutexGuard<()>,
    _entry: RowEntry,
}

/// A counted reference to a table entry. The last one out removes the entry.
struct RowEntry {
    id: AccountId,
    row: Option<Arc<RowMutex<()>>>,
    rows: Arc<Mutex<RowTable>>,
}

fn table(rows: &Mutex<RowTable>) -> MutexGuard<'_, RowTable> {
    // The table holds no invariant a panicking holder could break.
    rows.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for RowEntry {
    fn drop(&mut self) {
        let mut rows = table(&self.rows);
        drop(self.row.take());
        if let Some(row) = rows.get(&self.id)
            && Arc::strong_count(row) == 1
        {
            rows.remove(&self.id);
        }
    }
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the row for `id` is free and takes it.
    ///
    /// Cancelling the wait leaves the table as if the call never happened.
    pub async fn acquire(&self, id: &AccountId) -> RowGuard {
        let (row, entry) = {
            let mut rows = table(&self.rows);
            let row = rows.entry(id.clone()).or_default().clone();
            let entry = RowEntry {
                id: id.clone(),
                row: Some(row.clone()),
                rows: self.rows.clone(),
            };
            (row, entry)
        };
        // If this future is dropped mid-wait, the pending lock goes before `entry`.
        RowGuard {
            _guard: row.lock_owned().await,
            _entry: entry,
        }
    }

    /// Number of rows currently held or waited on.
    pub fn len(&self) -> usize {
        table(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
