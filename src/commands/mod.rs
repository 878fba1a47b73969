pub mod accounts;
pub mod run;

// Re-export command functions for convenience
pub use accounts::accounts;
pub use run::{run, RunArgs};
