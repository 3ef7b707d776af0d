// Application layer - the ledger use cases, independent of transport.

pub mod error;
mod service;

pub use error::*;
pub use service::*;
