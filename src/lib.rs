pub mod app;
pub mod archive;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod output;
pub mod scanner;
pub mod store;
pub mod tracking;
pub mod worker;
