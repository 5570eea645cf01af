//! REST client for the coaching backend.
//!
//! `ApiClient` performs the token refresh call used by the session manager
//! and the authenticated reads behind the coach dashboard and meal-plan
//! history views. It never decides whether a session is valid; callers
//! pass in headers obtained from `SessionManager::auth_headers`.

pub mod client;
pub mod error;
pub mod models;

pub use client::ApiClient;
pub use error::ApiError;
pub use models::{CoachInsight, MealPlanSummary};
