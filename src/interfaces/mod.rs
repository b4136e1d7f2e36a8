//! Wire-format adapters around the ledger: HTTP/JSON and CSV.

pub mod csv;
pub mod http;
