pub mod aggregator;
pub mod analysis;
pub mod config;
pub mod database;
pub mod error;
pub mod loader;
pub mod models;
pub mod narrative;
pub mod routes;
