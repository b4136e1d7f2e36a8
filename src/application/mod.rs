//! Application layer containing the ledger's business logic.
//!
//! This module defines the `LedgerService`, the primary entry point for creating
//! accounts, transferring money and querying the ledger. Concurrency control is
//! delegated to the store's units of work; the service itself is stateless and can be
//! shared between tasks behind an `Arc`.

pub mod ledger;
