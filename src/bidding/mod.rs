pub mod commands;
pub mod error;
pub mod ledger;
