use super::account::AccountId;
use super::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Store-assigned identity of a payment. Sequential and unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub i64);

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fields of a payment known before the store assigns its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    /// Time of the transfer, in UTC.
    pub time: DateTime<Utc>,
    /// Account the money was taken from.
    pub from: AccountId,
    /// Account the money was moved to.
    pub to: AccountId,
    /// Always positive.
    pub amount: Money,
    pub currency: Currency,
}

impl NewPayment {
    pub fn with_id(self, id: PaymentId) -> Payment {
        Payment {
            id,
            time: self.time,
            from: self.from,
            to: self.to,
            amount: self.amount,
            currency: self.currency,
        }
    }
}

/// Immutable audit record of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub time: DateTime<Utc>,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Money,
    pub currency: Currency,
}

impl Payment {
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.from == account || &self.to == account
    }

    /// Statement order: newest first, later insertions first on equal timestamps.
    pub fn newest_first(a: &Payment, b: &Payment) -> Ordering {
        b.time.cmp(&a.time).then_with(|| b.id.cmp(&a.id))
    }
}

/// A payment as seen from one of its two accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountPayment {
    pub payment: Payment,
    /// True when the viewing account sent the money.
    pub outgoing: bool,
}

impl AccountPayment {
    pub fn for_account(payment: Payment, account: &AccountId) -> Self {
        let outgoing = &payment.from == account;
        Self { payment, outgoing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payment(id: i64, secs: i64) -> Payment {
        NewPayment {
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            from: AccountId::from("bob"),
            to: AccountId::from("alice"),
            amount: Money::from(10),
            currency: Currency::new("USD"),
        }
        .with_id(PaymentId(id))
    }

    #[test]
    fn test_newest_first_breaks_ties_by_id() {
        let mut payments = vec![payment(1, 100), payment(3, 50), payment(2, 100)];
        payments.sort_by(Payment::newest_first);
        let ids: Vec<i64> = payments.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_outgoing_is_relative_to_viewer() {
        let p = payment(1, 0);
        assert!(AccountPayment::for_account(p.clone(), &AccountId::from("bob")).outgoing);
        assert!(!AccountPayment::for_account(p.clone(), &AccountId::from("alice")).outgoing);
        assert!(p.involves(&AccountId::from("alice")));
        assert!(!p.involves(&AccountId::from("carol")));
    }
}
