//! Pure selection and scheduling policies.
//!
//! Nothing in here performs I/O; the orchestrator feeds these functions with
//! candidate timestamps and persisted run markers and acts on the verdicts.

pub mod schedule;
pub mod window;

pub use schedule::schedule_pair;
pub use window::{in_window, SelectionMode};
