//! Session and data layer for the dietdash coaching dashboard.
//!
//! The dashboard views gate access, attach bearer headers and react to
//! expiry through [`auth::SessionManager`]; the data they display comes
//! from [`api::ApiClient`].

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionManager, SessionStore};
pub use config::{Config, StoreBackend};
