use super::locks::{RowGuard, RowLocks};
use crate::domain::account::{Account, AccountId};
use crate::domain::money::{Currency, Money};
use crate::domain::payment::{NewPayment, Payment, PaymentId};
use crate::domain::ports::{ACCOUNT_PKEY, LedgerStore, StoreResult, UnitOfWork, UnitOfWorkBox};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Column Family for storing accounts, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing payments, keyed by big-endian payment id.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent ledger store implementation using RocksDB.
///
/// Accounts and payments live in separate Column Families with JSON values. A unit of
/// work buffers its writes and commits them as a single `WriteBatch`, so a transfer's
/// two balance updates and its payment become durable together or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`, the row lock
/// table and the payment sequence).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: RowLocks,
    payment_sequence: Arc<AtomicI64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist and resumes the payment sequence
    /// after the highest stored payment id.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_accounts, cf_payments])?;
        let last_payment = last_payment_id(&db)?;
        tracing::debug!(last_payment, "opened RocksDB ledger store");

        Ok(Self {
            db: Arc::new(db),
            locks: RowLocks::new(),
            payment_sequence: Arc::new(AtomicI64::new(last_payment)),
        })
    }
}

fn column_family<'a>(db: &'a DB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        StoreError::Backend(Box::new(std::io::Error::other(format!(
            "column family `{name}` not found"
        ))))
    })
}

fn last_payment_id(db: &DB) -> StoreResult<i64> {
    let cf = column_family(db, CF_PAYMENTS)?;
    match db.iterator_cf(cf, IteratorMode::End).next() {
        Some(item) => {
            let (key, _) = item?;
            let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                StoreError::Backend(Box::new(std::io::Error::other(format!(
                    "malformed payment key of {} bytes",
                    key.len()
                ))))
            })?;
            Ok(i64::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

fn read_account(db: &DB, id: &AccountId) -> StoreResult<Option<Account>> {
    let cf = column_family(db, CF_ACCOUNTS)?;
    match db.get_pinned_cf(cf, id.as_str().as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn insert_account(&self, account: Account) -> StoreResult<()> {
        // The row lock turns the existence check and the put into one step.
        let _row = self.locks.acquire(&account.id).await;
        if read_account(&self.db, &account.id)?.is_some() {
            return Err(StoreError::UniqueViolation {
                constraint: ACCOUNT_PKEY,
            });
        }

        let cf = column_family(&self.db, CF_ACCOUNTS)?;
        let value = serde_json::to_vec(&account)?;
        self.db.put_cf(cf, account.id.as_str().as_bytes(), value)?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<UnitOfWorkBox> {
        Ok(Box::new(RocksDBUnitOfWork {
            db: self.db.clone(),
            locks: self.locks.clone(),
            sequence: self.payment_sequence.clone(),
            held: HashMap::new(),
            accounts: HashMap::new(),
            payments: Vec::new(),
        }))
    }

    async fn account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        read_account(&self.db, id)
    }

    async fn account_ids(&self, currency: &Currency) -> StoreResult<Vec<AccountId>> {
        let cf = column_family(&self.db, CF_ACCOUNTS)?;
        let mut ids = Vec::new();
        // Keys are raw UTF-8 ids, so iteration order is ascending id order.
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let account: Account = serde_json::from_slice(&value)?;
            if &account.currency == currency {
                ids.push(account.id);
            }
        }
        Ok(ids)
    }

    async fn payments_for(&self, id: &AccountId) -> StoreResult<Vec<Payment>> {
        let cf = column_family(&self.db, CF_PAYMENTS)?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let payment: Payment = serde_json::from_slice(&value)?;
            if payment.involves(id) {
                payments.push(payment);
            }
        }
        Ok(payments)
    }
}

/// Unit of work over a [`RocksDBStore`].
pub struct RocksDBUnitOfWork {
    db: Arc<DB>,
    locks: RowLocks,
    sequence: Arc<AtomicI64>,
    held: HashMap<AccountId, RowGuard>,
    /// Locked accounts with their pending balances applied.
    accounts: HashMap<AccountId, Account>,
    payments: Vec<Payment>,
}

#[async_trait]
impl UnitOfWork for RocksDBUnitOfWork {
    async fn lock_account(&mut self, id: &AccountId) -> StoreResult<Option<Account>> {
        if !self.held.contains_key(id) {
            let guard = self.locks.acquire(id).await;
            self.held.insert(id.clone(), guard);
        }
        if let Some(account) = self.accounts.get(id) {
            return Ok(Some(account.clone()));
        }

        let account = read_account(&self.db, id)?;
        if let Some(account) = &account {
            self.accounts.insert(id.clone(), account.clone());
        }
        Ok(account)
    }

    async fn update_balance(&mut self, id: &AccountId, balance: Money) -> StoreResult<()> {
        if !self.held.contains_key(id) {
            return Err(StoreError::RowNotLocked(id.to_string()));
        }
        let account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::RowNotLocked(id.to_string()))?;
        account.balance = balance;
        Ok(())
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<PaymentId> {
        let id = PaymentId(self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        self.payments.push(payment.with_id(id));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let RocksDBUnitOfWork {
            db,
            held,
            accounts,
            payments,
            ..
        } = *self;

        let cf_accounts = column_family(&db, CF_ACCOUNTS)?;
        let cf_payments = column_family(&db, CF_PAYMENTS)?;

        let mut batch = WriteBatch::default();
        for account in accounts.values() {
            let value = serde_json::to_vec(account)?;
            batch.put_cf(cf_accounts, account.id.as_str().as_bytes(), value);
        }
        for payment in &payments {
            let value = serde_json::to_vec(payment)?;
            batch.put_cf(cf_payments, payment.id.0.to_be_bytes(), value);
        }
        db.write(batch)?;

        drop(held);
        Ok(())
    }
}
