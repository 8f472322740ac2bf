//! AI Query Engine core.
//!
//! Translates natural-language analytical questions into executable SQL
//! against heterogeneous data sources, executes it safely, caches
//! outputs, persists query history, and streams pipeline progress to a
//! single caller.

use std::sync::Arc;

use sqlx::SqlitePool;

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::{DataSourceProvider, Orchestrator};

/// Shared application state, handed to every `axum` handler via `State`.
///
/// Every service the pipeline needs is constructed once at start-up and
/// wrapped in `Arc` for cheap cloning across concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub data_sources: Arc<dyn DataSourceProvider>,
}
