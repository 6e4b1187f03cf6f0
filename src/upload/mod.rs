//! Content-bound authorization and streaming upload.

pub mod authority;
pub mod identity;
pub mod retry;
pub mod transport;

pub use authority::{AuthorizationToken, SigningIdentity, UploadAuthority, UploadClaims};
pub use identity::KeyManager;
pub use retry::RetryPolicy;
pub use transport::{UploadDescriptor, UploadTransport};
