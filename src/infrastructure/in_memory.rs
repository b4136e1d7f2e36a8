use super::locks::{RowGuard, RowLocks};
use crate::domain::account::{Account, AccountId};
use crate::domain::money::{Currency, Money};
use crate::domain::payment::{NewPayment, Payment, PaymentId};
use crate::domain::ports::{ACCOUNT_PKEY, LedgerStore, StoreResult, UnitOfWork, UnitOfWorkBox};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    payments: Vec<Payment>,
}

/// A thread-safe in-memory ledger store.
///
/// Committed state lives behind one `RwLock`, which is only ever held for the duration
/// of a single read or a single commit. Transfers serialize on per-account row locks
/// instead, so a long-running unit of work never blocks readers.
/// Ideal for testing or for running without persistence.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    locks: RowLocks,
    payment_sequence: Arc<AtomicI64>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, account: Account) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.accounts.entry(account.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation {
                constraint: ACCOUNT_PKEY,
            }),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    async fn begin(&self) -> StoreResult<UnitOfWorkBox> {
        Ok(Box::new(InMemoryUnitOfWork {
            state: self.state.clone(),
            locks: self.locks.clone(),
            sequence: self.payment_sequence.clone(),
            held: HashMap::new(),
            balances: HashMap::new(),
            payments: Vec::new(),
        }))
    }

    async fn account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(id).cloned())
    }

    async fn account_ids(&self, currency: &Currency) -> StoreResult<Vec<AccountId>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .filter(|account| &account.currency == currency)
            .map(|account| account.id.clone())
            .collect())
    }

    async fn payments_for(&self, id: &AccountId) -> StoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|payment| payment.involves(id))
            .cloned()
            .collect())
    }
}

/// Unit of work over an [`InMemoryLedgerStore`].
///
/// Writes are buffered here and applied under the state write lock on commit.
pub struct InMemoryUnitOfWork {
    state: Arc<RwLock<LedgerState>>,
    locks: RowLocks,
    sequence: Arc<AtomicI64>,
    held: HashMap<AccountId, RowGuard>,
    balances: HashMap<AccountId, Money>,
    payments: Vec<Payment>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_account(&mut self, id: &AccountId) -> StoreResult<Option<Account>> {
        if !self.held.contains_key(id) {
            let guard = self.locks.acquire(id).await;
            self.held.insert(id.clone(), guard);
        }

        let state = self.state.read().await;
        Ok(state.accounts.get(id).cloned().map(|mut account| {
            if let Some(balance) = self.balances.get(id) {
                account.balance = *balance;
            }
            account
        }))
    }

    async fn update_balance(&mut self, id: &AccountId, balance: Money) -> StoreResult<()> {
        if !self.held.contains_key(id) {
            return Err(StoreError::RowNotLocked(id.to_string()));
        }
        self.balances.insert(id.clone(), balance);
        Ok(())
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<PaymentId> {
        let id = PaymentId(self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        self.payments.push(payment.with_id(id));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryUnitOfWork {
            state,
            held,
            balances,
            payments,
            ..
        } = *self;

        let mut committed = state.write().await;
        for (id, balance) in balances {
            if let Some(account) = committed.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        committed.payments.extend(payments);
        drop(committed);

        // Row locks go last, once the new balances are visible.
        drop(held);
        Ok(())
    }
}
