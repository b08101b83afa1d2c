//! HTTP API for the nowreact canvas.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Read endpoints** for the current height and the full cell list
//! - **A write endpoint** that sets one cell per request
//! - **Minimal HTML page** (`GET /`) showing the canvas read-only
//!
//! # Architecture
//!
//! Handlers are thin callers of the shared
//! [`StateStore`](nowreact_core::StateStore). They validate and decode
//! requests, map store errors to status codes, and never write to disk;
//! checkpointing is driven by the store's revision counter elsewhere.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, start_server};
pub use state::AppState;
