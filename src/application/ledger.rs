use crate::domain::account::{Account, AccountId};
use crate::domain::money::{Currency, Money};
use crate::domain::payment::{AccountPayment, NewPayment, Payment, PaymentId};
use crate::domain::ports::{ACCOUNT_PKEY, LedgerStoreBox, UnitOfWork};
use crate::error::{LedgerError, Result, StoreError};
use chrono::Utc;

fn account_already_exists() -> LedgerError {
    LedgerError::AccountAlreadyExists
}

/// Store constraints with a business meaning, keyed by constraint name.
const CONSTRAINT_ERRORS: &[(&str, fn() -> LedgerError)] =
    &[(ACCOUNT_PKEY, account_already_exists)];

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        if let StoreError::UniqueViolation { constraint } = &err
            && let Some((_, to_error)) = CONSTRAINT_ERRORS
                .iter()
                .find(|(name, _)| name == constraint)
        {
            return to_error();
        }
        tracing::error!(error = %err, "ledger store failure");
        LedgerError::Internal(err)
    }
}

/// The main entry point of the ledger.
///
/// `LedgerService` owns the storage backend and exposes the ledger operations: account
/// creation, transfers and the account/payment queries. It keeps no state of its own
/// between calls; every operation reads the store's committed state.
pub struct LedgerService {
    store: LedgerStoreBox,
}

impl LedgerService {
    /// Creates a new `LedgerService` on top of `store`.
    pub fn new(store: LedgerStoreBox) -> Self {
        Self { store }
    }

    /// Opens an account with an initial balance.
    ///
    /// Validation runs in a fixed order: a negative balance is reported before an
    /// unknown currency, which is reported before an empty id.
    pub async fn create_account(
        &self,
        id: AccountId,
        balance: Money,
        currency: Currency,
    ) -> Result<()> {
        if balance.is_negative() {
            return Err(LedgerError::InsufficientFunds);
        }
        if !currency.is_known() {
            return Err(LedgerError::IncompatibleCurrency);
        }
        if id.is_empty() {
            return Err(LedgerError::BadAccountId);
        }

        self.store
            .insert_account(Account::new(id.clone(), balance, currency.clone()))
            .await?;
        tracing::info!(account = %id, %balance, %currency, "account created");
        Ok(())
    }

    /// Moves `amount` from one account to another, atomically.
    ///
    /// Both accounts are locked in ascending id order, whichever of them is the sender.
    /// Every transfer acquires its locks in this one global order, so two transfers
    /// sharing accounts (mirror images included) queue on the same first lock and never
    /// wait on each other in a cycle. Nothing is written unless the whole
    /// transfer succeeds; dropping the returned future before it completes leaves the
    /// ledger untouched.
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Money,
        currency: &Currency,
    ) -> Result<PaymentId> {
        if from == to {
            return Err(LedgerError::BadTransferTarget);
        }
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }

        // One timestamp for both balance updates and the payment record.
        let time = Utc::now();

        let mut uow = self.store.begin().await?;
        let (sender, receiver) = match lock_pair(uow.as_mut(), from, to).await? {
            (Some(sender), Some(receiver)) => (sender, receiver),
            _ => return Err(LedgerError::AccountDoesNotExist),
        };

        if sender.currency != receiver.currency || &sender.currency != currency {
            tracing::debug!(%from, %to, %currency, "transfer rejected: currency mismatch");
            return Err(LedgerError::IncompatibleCurrency);
        }

        let new_sender_balance = sender
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InvalidAmount)?;
        let new_receiver_balance = receiver
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;
        if new_sender_balance.is_negative() {
            tracing::debug!(
                %from,
                %amount,
                balance = %sender.balance,
                "transfer rejected: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds);
        }

        uow.update_balance(from, new_sender_balance).await?;
        uow.update_balance(to, new_receiver_balance).await?;
        let payment_id = uow
            .insert_payment(NewPayment {
                time,
                from: from.clone(),
                to: to.clone(),
                amount,
                currency: currency.clone(),
            })
            .await?;
        uow.commit().await?;

        tracing::info!(%payment_id, %from, %to, %amount, %currency, "transfer committed");
        Ok(payment_id)
    }

    /// Ids of the accounts holding `currency`, ascending. A known currency with no
    /// accounts yields an empty list; an unknown one is an error.
    pub async fn get_accounts(&self, currency: &Currency) -> Result<Vec<AccountId>> {
        if !currency.is_known() {
            return Err(LedgerError::IncompatibleCurrency);
        }
        Ok(self.store.account_ids(currency).await?)
    }

    /// Payments sent or received by `id`, newest first.
    pub async fn get_payments(&self, id: &AccountId) -> Result<Vec<AccountPayment>> {
        if id.is_empty() {
            return Err(LedgerError::BadAccountId);
        }
        if self.store.account(id).await?.is_none() {
            return Err(LedgerError::AccountDoesNotExist);
        }

        let mut payments = self.store.payments_for(id).await?;
        payments.sort_by(Payment::newest_first);
        Ok(payments
            .into_iter()
            .map(|payment| AccountPayment::for_account(payment, id))
            .collect())
    }

    /// Committed state of a single account.
    pub async fn get_account(&self, id: &AccountId) -> Result<Account> {
        if id.is_empty() {
            return Err(LedgerError::BadAccountId);
        }
        self.store
            .account(id)
            .await?
            .ok_or(LedgerError::AccountDoesNotExist)
    }
}

/// Locks `from` and `to` lowest id first and returns them as `(from, to)`.
async fn lock_pair(
    uow: &mut dyn UnitOfWork,
    from: &AccountId,
    to: &AccountId,
) -> Result<(Option<Account>, Option<Account>)> {
    if from <= to {
        let sender = uow.lock_account(from).await?;
        let receiver = uow.lock_account(to).await?;
        Ok((sender, receiver))
    } else {
        let receiver = uow.lock_account(to).await?;
        let sender = uow.lock_account(from).await?;
        Ok((sender, receiver))
    }
}
