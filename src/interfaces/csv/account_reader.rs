use crate::domain::account::AccountId;
use crate::domain::money::{Currency, Money};
use crate::error::InputError;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: String,
    balance: String,
    currency: String,
}

/// One account to open, as read from a seed file.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedAccount {
    pub id: AccountId,
    pub balance: Money,
    pub currency: Currency,
}

impl TryFrom<AccountRecord> for SeedAccount {
    type Error = InputError;

    fn try_from(record: AccountRecord) -> Result<Self, Self::Error> {
        // Parsed from text so the balance never goes through a float.
        let balance = record
            .balance
            .parse::<Money>()
            .map_err(|source| InputError::Amount {
                value: record.balance.clone(),
                source,
            })?;
        Ok(Self {
            id: AccountId::from(record.id),
            balance,
            currency: Currency::from(record.currency),
        })
    }
}

/// Reads accounts to open from a CSV source with header `id,balance,currency`.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<SeedAccount>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    /// Creates a new `AccountReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates rows.
    ///
    /// A malformed row yields an error and the iterator moves on to the next one.
    pub fn accounts(self) -> impl Iterator<Item = Result<SeedAccount, InputError>> {
        self.reader.into_deserialize().map(|result| {
            let record: AccountRecord = result?;
            SeedAccount::try_from(record)
        })
    }
}
