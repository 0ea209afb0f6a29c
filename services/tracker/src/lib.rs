//! GPS location tracker service
//!
//! Accepts position reports over HTTP, appends them to a durable journal,
//! keeps the most recent one in memory and serves the latest N back as JSON.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod parse;
pub mod retrieval;
pub mod router;
pub mod state;

pub use config::Config;
pub use router::create_router;
pub use state::{AppState, ServiceSettings};
