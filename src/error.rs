use thiserror::Error;

/// Failures reported by a [`LedgerStore`](crate::domain::ports::LedgerStore) adapter.
///
/// Adapters signal known conditions structurally (a violated constraint is named, never
/// described in free text) so the application layer can classify them without parsing
/// messages.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: &'static str },
    #[error("account `{0}` is not locked by this unit of work")]
    RowNotLocked(String),
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by the ledger operations.
///
/// Validation and conflict variants are meant to be shown to callers as-is.
/// `Internal` keeps the storage cause as its `source()` for logging but displays as an
/// opaque message.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("bad account id")]
    BadAccountId,
    #[error("incompatible currency")]
    IncompatibleCurrency,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("bad transfer target")]
    BadTransferTarget,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("account already exists")]
    AccountAlreadyExists,
    #[error("account does not exist")]
    AccountDoesNotExist,
    #[error("internal error")]
    Internal(#[source] StoreError),
}

impl LedgerError {
    /// True for errors caused by the request itself rather than by the infrastructure.
    pub fn is_business(&self) -> bool {
        !matches!(self, LedgerError::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised while reading or writing CSV files at the CLI boundary.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid amount `{value}`: {source}")]
    Amount {
        value: String,
        source: rust_decimal::Error,
    },
}
