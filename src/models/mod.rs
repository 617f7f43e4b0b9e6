pub mod identity;
pub mod session;

pub use identity::{
    Identity, LegacyAccount, ProfileFields, ProfileUpdate, SignUpOutcome, SignUpReceipt,
    SignUpRequest,
};
pub use session::{ProviderOrigin, Session, SessionCheck};
