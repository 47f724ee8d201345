pub mod admission;
pub mod auction;
pub mod bidding;
pub mod broadcast;
pub mod config;
pub mod database;
pub mod handlers;
pub mod query;
pub mod scheduler;
