pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod scheduler;
pub mod vrm;
