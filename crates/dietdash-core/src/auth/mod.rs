//! Authentication module for the coaching dashboard session.
//!
//! This module provides:
//! - `token`: fail-closed inspection of the bearer token's payload
//! - `SessionStore`: injected key/value storage (memory, file, OS keychain)
//! - `SessionManager`: validation, refresh and teardown of the stored token
//!
//! Tokens count as expired 60 seconds before their `exp` claim.

pub mod credentials;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::KeyringStore;
pub use session::{
    AccessDecision, AuthStatus, Redirect, SessionManager, SessionState, CONSENT_REQUIRED_NOTICE,
    LOGIN_PATH,
};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use token::{MalformedReason, Payload, TokenStatus};
