pub mod config;
pub mod error;
pub mod mode;
pub mod types;
pub mod watchlist;
