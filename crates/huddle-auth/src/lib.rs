//! Bearer-token authentication and user resolution for huddle.
//!
//! Tokens are stateless: an HMAC-SHA256 signature over `subject:expiry`
//! with a shared secret, verified without any server-side session
//! store. This trades non-revocability before expiry for statelessness,
//! deliberately. The [`UserDirectory`] trait resolves an authenticated
//! subject to its public profile; the gateway takes the directory by
//! reference as an explicitly constructed service.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod token;

pub use directory::{InMemoryDirectory, User, UserDirectory, derive_username};
pub use token::{DEFAULT_TOKEN_TTL, TokenAuthenticator, TokenClaims, TokenError};
