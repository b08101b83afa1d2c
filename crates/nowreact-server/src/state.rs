//! Shared application state for the canvas HTTP API.
//!
//! [`AppState`] is the handle handlers receive through Axum's `State`
//! extractor. It holds a reference to the [`StateStore`]; handlers never
//! see the grid directly and never touch the disk.

use std::sync::Arc;

use nowreact_core::StateStore;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The canvas.
    pub store: Arc<StateStore>,
}

impl AppState {
    /// Wrap an existing store.
    pub const fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}
