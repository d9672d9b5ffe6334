//! Core module: configuration, station state and background tasks
//!
//! - [`Config`] - environment-driven configuration
//! - [`StationState`] - shared handles to every component
//! - [`BackgroundTasks`] - panic-catching task registry

pub mod config;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::StationState;
pub use tasks::{BackgroundTasks, TaskKind};
