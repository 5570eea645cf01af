//! Session lifecycle for the stored bearer token.
//!
//! `SessionManager` is the only code that mutates the stored credential.
//! It answers "is the caller authenticated" and hands back a `Redirect`
//! whenever the answer becomes no; performing the navigation is left to
//! the UI layer.
//!
//! States are derived on every call rather than tracked:
//!
//! - `LoggedOut`: no token, or one that cannot be decoded
//! - `LoggedInValid`: outside the near-expiry window
//! - `LoggedInExpiringSoon`: valid, inside the window; `refresh_token` returns
//!   to `LoggedInValid`
//! - `LoggedInExpired`: only `logout` and a fresh external login leave it

use reqwest::header;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::store::{SessionStore, IS_ADMIN_KEY, SESSION_KEYS, TOKEN_KEY};
use super::token::{self, Payload, TokenStatus, NEAR_EXPIRY_MINUTES};
use crate::api::{ApiClient, ApiError, CoachInsight, MealPlanSummary};

/// Route of the login entry point
pub const LOGIN_PATH: &str = "/login";

/// Shown when a valid session lacks the consent claim
pub const CONSENT_REQUIRED_NOTICE: &str =
    "You need to accept the data consent agreement before using the dashboard. Please log in again to review it.";

/// Navigation the caller must perform after the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: &'static str,
    /// Full page load, discarding all in-memory state
    pub full_reload: bool,
}

impl Redirect {
    pub fn login() -> Self {
        Self {
            location: LOGIN_PATH,
            full_reload: true,
        }
    }
}

/// Outcome of guarding a protected action.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Granted(Payload),
    /// Missing, malformed or expired token. Session already torn down.
    Unauthenticated(Redirect),
    /// Valid token without consent. Session already torn down; the caller
    /// shows `CONSENT_REQUIRED_NOTICE` before navigating.
    ConsentRequired(Redirect),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            AccessDecision::Granted(_) => None,
            AccessDecision::Unauthenticated(r) | AccessDecision::ConsentRequired(r) => Some(r),
        }
    }

    pub fn notice(&self) -> Option<&'static str> {
        match self {
            AccessDecision::ConsentRequired(_) => Some(CONSENT_REQUIRED_NOTICE),
            _ => None,
        }
    }
}

/// Snapshot for the dashboard's session indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_valid: bool,
    /// Seconds until expiry
    pub time_remaining: i64,
    pub near_expiry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedInValid,
    LoggedInExpiringSoon,
    LoggedInExpired,
}

pub struct SessionManager<S: SessionStore> {
    store: S,
    api: ApiClient,
    near_expiry_minutes: i64,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, api: ApiClient) -> Self {
        Self {
            store,
            api,
            near_expiry_minutes: NEAR_EXPIRY_MINUTES,
        }
    }

    /// Override the window used for `near_expiry` in status snapshots
    pub fn with_near_expiry_minutes(mut self, minutes: i64) -> Self {
        self.near_expiry_minutes = minutes;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the raw token. Store errors count as no token.
    pub fn stored_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        }
    }

    /// Hand-off from the external login flow.
    pub fn store_token(&self, token: &str) -> anyhow::Result<()> {
        self.store.set(TOKEN_KEY, token)?;
        info!("Token stored");
        Ok(())
    }

    pub fn current_user(&self) -> Option<Payload> {
        let token = self.stored_token()?;
        match token::inspect(&token) {
            TokenStatus::Valid(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.current_user().map(|p| p.is_admin()).unwrap_or(false)
    }

    /// Headers for an authenticated request, or `None` if the caller must
    /// treat the user as logged out.
    pub fn auth_headers(&self) -> Option<header::HeaderMap> {
        let token = self.stored_token()?;
        if token::is_expired(&token) {
            return None;
        }

        let value = match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => value,
            Err(_) => {
                warn!("Stored token is not a valid header value");
                return None;
            }
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        Some(headers)
    }

    /// Gate a protected action on a valid token carrying consent.
    pub fn require_auth(&self) -> AccessDecision {
        let status = match self.stored_token() {
            Some(token) => token::inspect(&token),
            None => {
                debug!("No stored token");
                return AccessDecision::Unauthenticated(self.logout());
            }
        };

        match status {
            TokenStatus::Valid(payload) if payload.has_consent() => AccessDecision::Granted(payload),
            TokenStatus::Valid(payload) => {
                warn!(sub = %payload.sub, "Consent not given, ending session");
                AccessDecision::ConsentRequired(self.logout())
            }
            TokenStatus::Expired { exp } => {
                info!(exp, "Token expired, ending session");
                AccessDecision::Unauthenticated(self.logout())
            }
            TokenStatus::Malformed(reason) => {
                warn!(?reason, "Malformed token, ending session");
                AccessDecision::Unauthenticated(self.logout())
            }
        }
    }

    /// Remove the token and every cached piece of user state.
    ///
    /// Removal failures are logged and the remaining keys are still cleared.
    pub fn logout(&self) -> Redirect {
        for key in SESSION_KEYS {
            if let Err(e) = self.store.remove(key) {
                error!(key, error = %e, "Failed to clear session key");
            }
        }
        info!("Session cleared");
        Redirect::login()
    }

    /// Swap the stored token for a fresh one.
    ///
    /// Returns `None` when there is nothing to refresh or the session has
    /// ended; in the latter case the store is already cleared and the
    /// caller should navigate to `Redirect::login()`.
    pub async fn refresh_token(&self) -> Option<String> {
        let token = self.stored_token()?;

        if token::is_expired(&token) {
            info!("Stored token already expired, cannot refresh");
            self.logout();
            return None;
        }

        match self.api.refresh_token(&token).await {
            Ok(fresh) => {
                if let Err(e) = self.store.set(TOKEN_KEY, &fresh) {
                    error!(error = %e, "Failed to store refreshed token");
                    self.logout();
                    return None;
                }
                info!(remaining = token::time_remaining(&fresh), "Token refreshed");
                Some(fresh)
            }
            Err(e) => {
                error!(error = %e, "Token refresh failed");
                self.logout();
                None
            }
        }
    }

    /// Read-only snapshot, except that an invalid token is cleared.
    pub fn check_auth_status(&self) -> AuthStatus {
        let Some(token) = self.stored_token() else {
            return AuthStatus::default();
        };

        let status = AuthStatus {
            is_valid: token::is_valid(&token),
            time_remaining: token::time_remaining(&token),
            near_expiry: token::is_near_expiry(&token, self.near_expiry_minutes),
        };

        if !status.is_valid {
            debug!("Clearing invalid token");
            for key in [TOKEN_KEY, IS_ADMIN_KEY] {
                if let Err(e) = self.store.remove(key) {
                    error!(key, error = %e, "Failed to clear session key");
                }
            }
        }

        status
    }

    pub fn session_state(&self) -> SessionState {
        let Some(token) = self.stored_token() else {
            return SessionState::LoggedOut;
        };

        match token::inspect(&token) {
            TokenStatus::Malformed(_) => SessionState::LoggedOut,
            TokenStatus::Expired { .. } => SessionState::LoggedInExpired,
            TokenStatus::Valid(_) if token::is_near_expiry(&token, self.near_expiry_minutes) => {
                SessionState::LoggedInExpiringSoon
            }
            TokenStatus::Valid(_) => SessionState::LoggedInValid,
        }
    }

    // ===== Authenticated reads =====

    /// Headers for a request, ending the session when there are none
    fn request_headers(&self) -> Result<header::HeaderMap, ApiError> {
        self.auth_headers().ok_or(ApiError::Unauthorized)
    }

    /// A 401 from the backend ends the session
    fn on_api_error(&self, e: ApiError) -> ApiError {
        if e.is_unauthorized() {
            warn!("Backend rejected token, ending session");
            self.logout();
        }
        e
    }

    pub async fn fetch_coach_insights(&self) -> Result<Vec<CoachInsight>, ApiError> {
        let headers = self.request_headers()?;
        self.api
            .fetch_coach_insights(headers)
            .await
            .map_err(|e| self.on_api_error(e))
    }

    pub async fn fetch_meal_plan_history(&self) -> Result<Vec<MealPlanSummary>, ApiError> {
        let headers = self.request_headers()?;
        self.api
            .fetch_meal_plan_history(headers)
            .await
            .map_err(|e| self.on_api_error(e))
    }
}
