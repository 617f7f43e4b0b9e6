// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
pub mod auth;
pub mod logging;
pub mod types;

pub use auth::*;
pub use logging::*;
pub use types::*;
