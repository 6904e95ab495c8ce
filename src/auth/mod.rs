//! Authentication: API keys, HMAC-signed tokens, permission checks, and
//! outbound credential application.

pub mod credentials;
pub mod keys;
pub mod middleware;
pub mod token;

pub use credentials::{CredentialKind, CredentialService, OutboundCredential, OutboundCredentialStore};
pub use keys::{ApiKeyRecord, ApiKeyStore, KeyService};
pub use middleware::{authenticate, AuthState, Identity};
pub use token::{Claims, TokenError};
