//! API client for the coaching backend.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use super::models::{sort_insights, sort_meal_plans, CoachInsight, ListResponse, MealPlanSummary};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default backend used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const REFRESH_PATH: &str = "/api/refresh-token";
const INSIGHTS_PATH: &str = "/api/coach/insights";
const MEAL_PLAN_HISTORY_PATH: &str = "/api/meal-plans/history";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) reads.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange a still-valid token for a fresh one.
    ///
    /// A single attempt: any failure is returned to the caller, which is
    /// expected to end the session rather than retry.
    pub async fn refresh_token(&self, token: &str) -> Result<String, ApiError> {
        let url = self.url(REFRESH_PATH);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        let parsed: RefreshResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("refresh response: {}", e)))?;

        if parsed.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("empty access_token".to_string()));
        }
        Ok(parsed.access_token)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Authenticated GET, backing off on 429.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: header::HeaderMap,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(headers.clone())
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let response = Self::check_response(response).await?;
            let text = response.text().await?;
            debug!(url = %url, bytes = text.len(), "Response received");
            return serde_json::from_str(&text)
                .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)));
        }
    }

    // ===== Dashboard data =====

    /// Coaching insights, newest first
    pub async fn fetch_coach_insights(
        &self,
        headers: header::HeaderMap,
    ) -> Result<Vec<CoachInsight>, ApiError> {
        let response: ListResponse<CoachInsight> = self.get_json(INSIGHTS_PATH, headers).await?;
        let mut insights = response.into_vec();
        sort_insights(&mut insights);
        Ok(insights)
    }

    /// Meal-plan history, newest first
    pub async fn fetch_meal_plan_history(
        &self,
        headers: header::HeaderMap,
    ) -> Result<Vec<MealPlanSummary>, ApiError> {
        let response: ListResponse<MealPlanSummary> =
            self.get_json(MEAL_PLAN_HISTORY_PATH, headers).await?;
        let mut plans = response.into_vec();
        sort_meal_plans(&mut plans);
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn bearer(token: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://example.test/").unwrap();
        assert_eq!(client.url(REFRESH_PATH), "http://example.test/api/refresh-token");
    }

    #[tokio::test]
    async fn test_refresh_token_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(REFRESH_PATH)
                .header("authorization", "Bearer old")
                .header("content-type", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"new"}"#);
        });

        let client = ApiClient::new(&server.base_url()).unwrap();
        let token = client.refresh_token("old").await.unwrap();
        assert_eq!(token, "new");
        mock.assert();
    }

    #[tokio::test]
    async fn test_refresh_token_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(REFRESH_PATH);
            then.status(401).body("expired");
        });
        let client = ApiClient::new(&server.base_url()).unwrap();
        assert!(client.refresh_token("old").await.unwrap_err().is_unauthorized());

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(REFRESH_PATH);
            then.status(200).body(r#"{"token":"wrong-field"}"#);
        });
        let client = ApiClient::new(&server.base_url()).unwrap();
        assert!(matches!(
            client.refresh_token("old").await,
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_meal_plan_history() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(MEAL_PLAN_HISTORY_PATH)
                .header("authorization", "Bearer t");
            then.status(200).body(
                r#"[{"title":"A","createdAt":"2026-01-01T00:00:00Z"},{"title":"B","createdAt":"2026-02-01T00:00:00Z"}]"#,
            );
        });

        let client = ApiClient::new(&server.base_url()).unwrap();
        let plans = client.fetch_meal_plan_history(bearer("t")).await.unwrap();
        assert_eq!(plans[0].title, "B");
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_insights_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(INSIGHTS_PATH);
            then.status(404).body("no insights");
        });

        let client = ApiClient::new(&server.base_url()).unwrap();
        let err = client.fetch_coach_insights(bearer("t")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref body) if body == "no insights"));
    }
}
