//! HTTP API for eventline
//!
//! Serves the persistence gateway routes and the messaging platform webhook.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::db::Database;
use crate::dispatch::Dispatcher;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(db: Database, dispatcher: Arc<Dispatcher>) -> Self {
        Self { db, dispatcher }
    }
}
