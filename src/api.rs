//! HTTP API for hosting game sessions

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::content::ContentStore;
use crate::runtime::{RuntimeConfig, SessionManager};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(content: Arc<ContentStore>, config: RuntimeConfig) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(content, config)),
        }
    }
}
