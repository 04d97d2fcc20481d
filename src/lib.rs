pub mod auction;
pub mod config;
pub mod database;
pub mod handlers;
pub mod ledger;
pub mod query;
pub mod store;
