//! Grid state, checkpointing, and persistence for the nowreact canvas.
//!
//! This crate owns everything with a correctness hazard: concurrent writers
//! to one shared grid, and crash-consistent saving of that grid.
//!
//! # Modules
//!
//! - [`store`] -- [`StateStore`], the single owner of the canvas snapshot.
//! - [`persistence`] -- Atomic load and save of the snapshot file.
//! - [`checkpoint`] -- Background task that saves the store after changes
//!   and flushes on shutdown.
//! - [`config`] -- Configuration loading from `nowreact-config.yaml` into
//!   strongly-typed structs.
//!
//! # Data flow
//!
//! ```text
//! handler --set_cell--> StateStore --revision--> Checkpointer
//!                                                     |
//!                                  copy snapshot, release lock
//!                                                     |
//!                                      save_to_disk (blocking thread)
//! ```
//!
//! [`StateStore`]: store::StateStore

pub mod checkpoint;
pub mod config;
pub mod persistence;
pub mod store;

pub use checkpoint::{CheckpointHandle, CheckpointPolicy, Checkpointer};
pub use config::{ConfigError, NodeConfig};
pub use persistence::{Loaded, PersistError, load_from_disk, save_to_disk};
pub use store::{StateStore, StoreError};
