//! evalswipe-review library interface
//!
//! The review session engine: traces under review, the annotation workflow,
//! bounded undo, navigation, progress, and checkpoint/restore through a
//! durable store. The backend API and the store are collaborators behind
//! traits so the engine can run against the real services or in-process ones.

pub mod backend;
pub mod command;
pub mod error;
pub mod export;
pub mod history;
pub mod import;
pub mod manager;
pub mod models;
pub mod navigation;
pub mod progress;
pub mod session;
pub mod store;
pub mod tag_registry;
pub mod trace_set;
pub mod undo;
pub mod workflow;

pub use crate::error::{ReviewError, ReviewResult};
pub use crate::manager::{SessionManager, SessionView};
pub use crate::session::{ReviewSession, SessionSnapshot};
