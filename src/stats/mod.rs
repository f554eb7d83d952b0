//! Usage statistics: document persistence, gamification profiles and the ledger

pub mod ledger;
pub mod profile;
pub mod store;

pub use ledger::*;
pub use profile::*;
pub use store::*;
