//! Token domain: persisted records, redacted secrets, embedded claims, and status views.

pub mod claims;
pub mod record;
pub mod secret;
pub mod status;

pub use claims::*;
pub use record::*;
pub use secret::*;
pub use status::*;
