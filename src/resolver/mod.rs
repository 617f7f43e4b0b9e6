pub mod error;
pub mod hub;
pub mod operation;
pub mod resolver;
pub mod validation;

// Re-export so callers can do "use crate::resolver::AuthResolver;"
pub use error::AuthError;
pub use hub::{AuthEvent, SessionHub};
pub use operation::{OperationClass, OperationState, OperationStatus};
pub use resolver::{AuthResolver, ResolverStatus};
