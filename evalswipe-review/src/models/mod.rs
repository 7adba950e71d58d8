//! Data models shared by the review engine and its collaborators

pub mod annotation;
pub mod session;
pub mod tag;
pub mod timestamp;
pub mod trace;

pub use annotation::Annotation;
pub use session::{ReviewMode, SessionConfig, SessionInfo, TraceSource};
pub use tag::{AxialTag, NewTag};
pub use trace::{Trace, TraceStatus, TraceStep, Verdict};
