//! Domain layer: value types, entities and the storage ports the application layer
//! depends on.

pub mod account;
pub mod money;
pub mod payment;
pub mod ports;
