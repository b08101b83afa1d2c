//! Shared type definitions for the nowreact canvas.
//!
//! This crate is the single source of truth for the grid model and for the
//! bodies exchanged with the web client. Wire types flow downstream to
//! `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`grid`] -- Square cell board, sizes, and index validation
//! - [`snapshot`] -- Full canvas state as held in memory and on disk
//! - [`api`] -- Request and response bodies

pub mod api;
pub mod grid;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use api::{HeightResponse, Submission};
pub use grid::{DEFAULT_GRID_SIDE, Grid, GridError, GridSize};
pub use snapshot::{DEFAULT_NAMESPACE, INITIAL_HEIGHT, Snapshot};
