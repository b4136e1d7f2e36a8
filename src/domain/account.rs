use super::money::{Currency, Money};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a ledger account.
///
/// Any string is representable; operations reject the empty id with
/// [`LedgerError::BadAccountId`](crate::error::LedgerError::BadAccountId).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The state of a single ledger account.
///
/// The balance is the only field that changes after creation, and only inside a
/// transfer holding the account's row lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Money,
    pub currency: Currency,
}

impl Account {
    pub fn new(id: AccountId, balance: Money, currency: Currency) -> Self {
        Self {
            id,
            balance,
            currency,
        }
    }
}
