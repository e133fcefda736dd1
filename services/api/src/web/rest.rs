//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

use crate::error::ApiError;
use crate::web::state::AppState;
use trashtalk_core::domain::Tone;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_handler,
        read_counter_handler,
        update_counter_handler,
        visitor_count_handler,
        track_visitor_handler,
        health_handler,
    ),
    components(
        schemas(
            GenerateRequest,
            GenerateResponse,
            CounterActionRequest,
            CounterResponse,
            VisitorCountResponse,
            TrackVisitorRequest,
            TrackVisitorResponse,
        )
    ),
    tags(
        (name = "TrashTalk API", description = "API endpoints for the chaos generator and its shared counters.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// One of the tone presets: gen-z, tech-bro, corporate, absurdist, anime.
    pub tone: String,
    /// Optional free-text focus appended to the prompt.
    pub custom_prompt: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_message: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CounterActionRequest {
    /// Either "increment" or "reset".
    pub action: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CounterResponse {
    pub value: i64,
    /// ISO-8601 timestamp of the last counter write.
    pub updated_at: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorCountResponse {
    pub total_unique_visitors: i64,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackVisitorRequest {
    pub user_id: Option<String>,
    pub user_agent: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackVisitorResponse {
    pub is_new_visitor: bool,
    pub user_visit_count: i64,
    pub total_unique_visitors: i64,
}

impl From<trashtalk_core::domain::CounterObservation> for CounterResponse {
    fn from(observation: trashtalk_core::domain::CounterObservation) -> Self {
        Self {
            value: observation.value,
            updated_at: observation.updated_at.to_rfc3339(),
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate one post for a tone preset.
///
/// Requires an `x-user-id` header carrying the caller's anonymous identity;
/// the rate limiter counts requests against it. The response always carries
/// text: upstream failures are silently replaced with fallback content and
/// flagged via `fallbackUsed`.
#[utoipa::path(
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Post generated (possibly fallback content)", body = GenerateResponse),
        (status = 400, description = "Unknown tone or missing identity header"),
        (status = 429, description = "Rate limit exceeded for this identity"),
        (status = 500, description = "Rate limit check failed")
    ),
    params(
        ("x-user-id" = String, Header, description = "Anonymous identity of the caller.")
    )
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let identity = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidInput("x-user-id header is required".to_string()))?;

    let tone = Tone::parse(&request.tone)
        .ok_or_else(|| ApiError::InvalidInput("invalid tone".to_string()))?;

    app_state
        .limiter
        .check_and_consume(identity, Utc::now())
        .await?;

    // Never fails: the gateway substitutes fallback content on any upstream
    // problem. Generated text is not persisted anywhere server-side.
    let post = app_state
        .gateway
        .generate(tone, request.custom_prompt.as_deref())
        .await;

    if post.fallback_used {
        info!("Served fallback content for tone '{}'", tone.as_str());
    }

    Ok(Json(GenerateResponse {
        text: post.text,
        fallback_used: post.fallback_used.then_some(true),
        fallback_message: post.fallback_message,
    }))
}

/// Read the global generation counter, seeding the row if it is absent.
#[utoipa::path(
    get,
    path = "/counter",
    responses(
        (status = 200, description = "Current counter value", body = CounterResponse),
        (status = 500, description = "Counter could not be read")
    )
)]
pub async fn read_counter_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<CounterResponse>, ApiError> {
    let observation = app_state.counter.read().await?;
    Ok(Json(observation.into()))
}

/// Increment or reset the global generation counter.
///
/// `reset` is administrative; production deployments should gate it
/// separately.
#[utoipa::path(
    post,
    path = "/counter",
    request_body = CounterActionRequest,
    responses(
        (status = 200, description = "Counter updated", body = CounterResponse),
        (status = 400, description = "Unknown action"),
        (status = 500, description = "Both increment paths failed")
    )
)]
pub async fn update_counter_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CounterActionRequest>,
) -> Result<Json<CounterResponse>, ApiError> {
    let observation = match request.action.as_str() {
        "increment" => app_state.counter.increment().await?,
        "reset" => {
            info!("Administrative counter reset requested");
            app_state.counter.reset().await?
        }
        _ => {
            return Err(ApiError::InvalidInput(
                "Invalid action. Use 'increment' or 'reset'".to_string(),
            ))
        }
    };

    Ok(Json(observation.into()))
}

/// Total number of unique visitors ever seen.
#[utoipa::path(
    get,
    path = "/visitors",
    responses(
        (status = 200, description = "Aggregate unique-visitor count", body = VisitorCountResponse),
        (status = 500, description = "Visitor stats could not be read")
    )
)]
pub async fn visitor_count_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<VisitorCountResponse>, ApiError> {
    let total_unique_visitors = app_state.visitors.total_unique_visitors().await?;
    Ok(Json(VisitorCountResponse {
        total_unique_visitors,
    }))
}

/// Track one visit for an identity.
///
/// The first call ever for a user id classifies it as a new visitor and
/// bumps the unique-visitor total exactly once, atomically in the store.
#[utoipa::path(
    post,
    path = "/visitors",
    request_body = TrackVisitorRequest,
    responses(
        (status = 200, description = "Visit recorded", body = TrackVisitorResponse),
        (status = 400, description = "Missing user id"),
        (status = 500, description = "Visit could not be recorded")
    )
)]
pub async fn track_visitor_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<TrackVisitorRequest>,
) -> Result<Json<TrackVisitorResponse>, ApiError> {
    let user_id = request
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("User ID is required".to_string()))?;

    let visit = app_state
        .visitors
        .track(
            user_id,
            request.user_agent.as_deref(),
            request.timezone.as_deref(),
            request.language.as_deref(),
        )
        .await?;

    Ok(Json(TrackVisitorResponse {
        is_new_visitor: visit.is_new_visitor,
        user_visit_count: visit.user_visit_count,
        total_unique_visitors: visit.total_unique_visitors,
    }))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::broadcast;
    use trashtalk_core::counter::GlobalCounterService;
    use trashtalk_core::domain::{CounterObservation, VisitorVisit};
    use trashtalk_core::gateway::ContentGateway;
    use trashtalk_core::ports::{
        ContentGenerationService, CounterStore, PortResult, RequestLog, VisitorStore,
    };
    use trashtalk_core::rate_limit::RateLimiter;

    /// In-memory visitor store mirroring the adapter's single-statement
    /// contract: each user id is classified as new exactly once, and the
    /// unique total moves only on that first sighting.
    struct MemoryVisitors {
        visits: Mutex<HashMap<String, i64>>,
        total_unique: Mutex<i64>,
    }

    impl MemoryVisitors {
        fn new() -> Self {
            Self {
                visits: Mutex::new(HashMap::new()),
                total_unique: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl VisitorStore for MemoryVisitors {
        async fn track(
            &self,
            user_id: &str,
            _user_agent: Option<&str>,
            _timezone: Option<&str>,
            _language: Option<&str>,
        ) -> PortResult<VisitorVisit> {
            let mut visits = self.visits.lock().unwrap();
            let mut total = self.total_unique.lock().unwrap();

            let count = visits.entry(user_id.to_string()).or_insert(0);
            let is_new = *count == 0;
            *count += 1;
            if is_new {
                *total += 1;
            }

            Ok(VisitorVisit {
                is_new_visitor: is_new,
                user_visit_count: *count,
                total_unique_visitors: *total,
            })
        }

        async fn total_unique_visitors(&self) -> PortResult<i64> {
            Ok(*self.total_unique.lock().unwrap())
        }
    }

    struct StubCounterStore;

    #[async_trait]
    impl CounterStore for StubCounterStore {
        async fn fetch(&self, _name: &str) -> PortResult<Option<CounterObservation>> {
            Ok(Some(CounterObservation {
                value: 0,
                updated_at: Utc::now(),
            }))
        }
        async fn create_if_absent(&self, _name: &str, _seed: i64) -> PortResult<()> {
            Ok(())
        }
        async fn increment(&self, _name: &str) -> PortResult<CounterObservation> {
            Ok(CounterObservation {
                value: 1,
                updated_at: Utc::now(),
            })
        }
        async fn put(&self, _name: &str, value: i64) -> PortResult<CounterObservation> {
            Ok(CounterObservation {
                value,
                updated_at: Utc::now(),
            })
        }
    }

    struct StubUpstream;

    #[async_trait]
    impl ContentGenerationService for StubUpstream {
        async fn complete(&self, _prompt: &str) -> PortResult<String> {
            Ok("stub post".to_string())
        }
    }

    struct StubRequestLog;

    #[async_trait]
    impl RequestLog for StubRequestLog {
        async fn record(&self, _identity: &str, _at: DateTime<Utc>) -> PortResult<()> {
            Ok(())
        }
        async fn count_since(&self, _identity: &str, _since: DateTime<Utc>) -> PortResult<i64> {
            Ok(0)
        }
    }

    fn test_state(visitors: Arc<dyn VisitorStore>) -> Arc<AppState> {
        let config = Arc::new(crate::config::Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: "postgres://unused".to_string(),
            log_level: tracing::Level::INFO,
            openai_api_key: None,
            generation_model: "test-model".to_string(),
            generation_timeout: std::time::Duration::from_secs(1),
            rate_limit_max_requests: 10,
            rate_limit_window_hours: 24,
            cors_allowed_origin: "http://localhost:3000".to_string(),
        });
        let (counter_updates, _) = broadcast::channel(8);

        Arc::new(AppState {
            config,
            counter: Arc::new(GlobalCounterService::new(Arc::new(StubCounterStore))),
            gateway: Arc::new(ContentGateway::new(
                Arc::new(StubUpstream),
                std::time::Duration::from_secs(1),
            )),
            visitors,
            limiter: Arc::new(RateLimiter::new(
                Arc::new(StubRequestLog),
                10,
                chrono::Duration::hours(24),
            )),
            counter_updates,
        })
    }

    fn track_request(user_id: &str) -> TrackVisitorRequest {
        TrackVisitorRequest {
            user_id: Some(user_id.to_string()),
            user_agent: Some("trashtalk/0.1.0 linux".to_string()),
            timezone: Some("UTC-5".to_string()),
            language: Some("en_US".to_string()),
        }
    }

    #[tokio::test]
    async fn first_track_is_new_and_bumps_the_unique_total_exactly_once() {
        let state = test_state(Arc::new(MemoryVisitors::new()));

        let first = track_visitor_handler(State(state.clone()), Json(track_request("user_a")))
            .await
            .unwrap()
            .0;
        assert!(first.is_new_visitor);
        assert_eq!(first.user_visit_count, 1);
        assert_eq!(first.total_unique_visitors, 1);

        // Every later visit from the same id: counted, never new again.
        for expected_count in 2..=4 {
            let repeat =
                track_visitor_handler(State(state.clone()), Json(track_request("user_a")))
                    .await
                    .unwrap()
                    .0;
            assert!(!repeat.is_new_visitor);
            assert_eq!(repeat.user_visit_count, expected_count);
            assert_eq!(repeat.total_unique_visitors, 1);
        }
    }

    #[tokio::test]
    async fn distinct_identities_each_count_once_toward_the_total() {
        let state = test_state(Arc::new(MemoryVisitors::new()));

        track_visitor_handler(State(state.clone()), Json(track_request("user_a")))
            .await
            .unwrap();
        let second = track_visitor_handler(State(state.clone()), Json(track_request("user_b")))
            .await
            .unwrap()
            .0;
        assert!(second.is_new_visitor);
        assert_eq!(second.total_unique_visitors, 2);

        let total = visitor_count_handler(State(state)).await.unwrap().0;
        assert_eq!(total.total_unique_visitors, 2);
    }

    #[tokio::test]
    async fn tracking_without_a_user_id_is_rejected() {
        let state = test_state(Arc::new(MemoryVisitors::new()));
        let request = TrackVisitorRequest {
            user_id: Some("   ".to_string()),
            user_agent: None,
            timezone: None,
            language: None,
        };

        match track_visitor_handler(State(state), Json(request)).await {
            Err(ApiError::InvalidInput(msg)) => assert!(msg.contains("User ID")),
            other => panic!("expected InvalidInput, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn generate_response_omits_fallback_fields_on_success() {
        let response = GenerateResponse {
            text: "real post".into(),
            fallback_used: None,
            fallback_message: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"text":"real post"}"#);
    }

    #[test]
    fn generate_response_discloses_fallback() {
        let response = GenerateResponse {
            text: "canned post".into(),
            fallback_used: Some(true),
            fallback_message: Some("API temporarily unavailable".into()),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""fallbackUsed":true"#));
        assert!(json.contains(r#""fallbackMessage""#));
    }

    #[test]
    fn generate_request_accepts_camel_case_custom_prompt() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"tone":"gen-z","customPrompt":"about cats"}"#).unwrap();
        assert_eq!(request.tone, "gen-z");
        assert_eq!(request.custom_prompt.as_deref(), Some("about cats"));
    }

    #[test]
    fn track_visitor_request_tolerates_missing_optionals() {
        let request: TrackVisitorRequest =
            serde_json::from_str(r#"{"userId":"user_abc123"}"#).unwrap();
        assert_eq!(request.user_id.as_deref(), Some("user_abc123"));
        assert!(request.user_agent.is_none());
    }
}
