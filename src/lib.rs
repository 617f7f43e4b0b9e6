//! Library exports for dualauth, shared between the binary and tests.

pub mod config;
pub mod guard;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod resolver;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
