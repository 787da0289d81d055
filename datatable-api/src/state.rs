//! Shared application state for Axum routers.

use std::sync::Arc;

use crate::hooks::DataTableHost;

#[derive(Clone)]
pub struct AppState {
    pub host: Arc<DataTableHost>,
}

impl AppState {
    pub fn new(host: DataTableHost) -> Self {
        Self {
            host: Arc::new(host),
        }
    }
}
