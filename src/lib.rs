pub mod app;
pub mod calendar;
pub mod catalog;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod report;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;
pub mod ui;

pub use app::router;
pub use calendar::MonthContext;
pub use catalog::{ActivityKey, ActivityKind, Catalog};
pub use client::{ActivityApi, HttpActivityApi};
pub use config::{ClientConfig, ServerConfig};
pub use errors::{StoreError, SyncError};
pub use models::{ActivityRecord, CellState};
pub use state::AppState;
pub use stats::{StatsAggregator, ViewType};
pub use storage::load_data;
pub use store::{Checkpoint, LocalActivityStore, PendingEdit};
pub use sync::{AutoSync, SyncEngine};
