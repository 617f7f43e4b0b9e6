pub mod base;
pub mod flowise_provider;
pub mod http;
pub mod plain_provider;
pub mod supabase_provider;

// Re-export from base.rs so we can do "use crate::providers::*;"
pub use base::*;
