//! # EvalSwipe Common Library
//!
//! Shared code for the EvalSwipe crates including:
//! - Error types
//! - Configuration loading and resolution
//! - Review event types (ReviewEvent enum) and the EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, ReviewEvent};
