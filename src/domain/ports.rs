use super::account::{Account, AccountId};
use super::money::{Currency, Money};
use super::payment::{NewPayment, Payment, PaymentId};
use crate::error::StoreError;
use async_trait::async_trait;

/// Name of the uniqueness constraint on account ids, reported through
/// [`StoreError::UniqueViolation`] when an id is inserted twice.
pub const ACCOUNT_PKEY: &str = "account_pkey";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable home of accounts and payments.
///
/// Plain reads see committed state only and never wait on row locks. Mutations of
/// existing accounts go through a [`UnitOfWork`] obtained from [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new account, failing with a unique violation on [`ACCOUNT_PKEY`] if the
    /// id is taken.
    async fn insert_account(&self, account: Account) -> StoreResult<()>;
    /// Opens a top-level unit of work.
    async fn begin(&self) -> StoreResult<UnitOfWorkBox>;
    async fn account(&self, id: &AccountId) -> StoreResult<Option<Account>>;
    /// Ids of all accounts in `currency`, ascending.
    async fn account_ids(&self, currency: &Currency) -> StoreResult<Vec<AccountId>>;
    /// Every payment where `id` is the sender or the receiver, in no particular order.
    async fn payments_for(&self, id: &AccountId) -> StoreResult<Vec<Payment>>;
}

/// An atomic group of reads and writes.
///
/// Row locks taken by [`lock_account`](UnitOfWork::lock_account) are held until the unit
/// of work is committed or dropped. Writes stay invisible to everyone else until
/// [`commit`](UnitOfWork::commit); dropping the unit of work without committing rolls it
/// back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Waits for the row lock on `id`, then reads the account. Locking a row this unit
    /// of work already holds returns immediately.
    async fn lock_account(&mut self, id: &AccountId) -> StoreResult<Option<Account>>;
    /// Buffers a new balance for an account locked by this unit of work.
    async fn update_balance(&mut self, id: &AccountId, balance: Money) -> StoreResult<()>;
    /// Buffers a payment and returns the identity it will be stored under.
    async fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<PaymentId>;
    /// Publishes every buffered write at once and releases the row locks.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type UnitOfWorkBox = Box<dyn UnitOfWork>;
