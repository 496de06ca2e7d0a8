//! Ledger module: chart of accounts, journal posting and statement derivation

pub mod chart;
pub mod engine;
pub mod journal;
pub mod statements;

pub use chart::ChartOfAccounts;
pub use engine::*;
pub use journal::*;
pub use statements::*;
