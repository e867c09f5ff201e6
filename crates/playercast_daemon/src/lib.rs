pub mod api;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod input;
pub mod stats;
