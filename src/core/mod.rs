pub mod aggregator;
pub mod budget;
pub mod config;
pub mod context;
pub mod cost;
pub mod formatter;
pub mod models;
pub mod pipeline;
pub mod recorder;
pub mod reports;
pub mod store;
