mod ledger;
mod transaction;
mod user;
mod wallet;

pub use ledger::*;
pub use transaction::*;
pub use user::*;
pub use wallet::*;

/// Money is an integer amount in the smallest currency unit.
pub type Amount = i64;
