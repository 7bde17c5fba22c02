use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use metamorph_core::error::ValidationError;
use metamorph_core::models::{
    ChartSeries, DailyEntryForm, DailyLogEntry, Dashboard, Profile, ProfileForm, parse_iso_date,
};
use metamorph_core::service::MetamorphService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<MetamorphService>>,
    api_key: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, MetamorphService> {
        self.service
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

/// Numeric fields are taken as raw JSON so that missing or non-numeric
/// values are reported as validation errors instead of extractor rejections.
#[derive(Deserialize)]
struct SaveProfileRequest {
    start_date: Option<String>,
    start_weight: Option<serde_json::Value>,
    target_weight: Option<serde_json::Value>,
    height: Option<serde_json::Value>,
    age: Option<serde_json::Value>,
    intensity: Option<serde_json::Value>,
    start_photo: Option<String>,
}

#[derive(Deserialize)]
struct SaveEntryRequest {
    date: Option<String>,
    weight: Option<serde_json::Value>,
    waist: Option<serde_json::Value>,
    notes: Option<String>,
    photo_path: Option<String>,
}

/// Form text for a JSON value; `null` counts as absent.
fn form_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn required_date(field: &'static str, value: Option<&str>) -> Result<NaiveDate, ValidationError> {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => parse_iso_date(s),
        _ => Err(ValidationError::Missing { field }),
    }
}

#[derive(Deserialize)]
struct ChartQuery {
    start: Option<String>,
}

#[derive(Serialize)]
struct LatestWeightResponse {
    weight: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(ValidationError),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, field) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Self::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), err.field()),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };
        (status, Json(ErrorResponse { error, field })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let validation = err
            .chain()
            .find_map(|e| e.downcast_ref::<ValidationError>())
            .cloned();
        match validation {
            Some(v) => Self::BadRequest(v),
            None => Self::Internal(err),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err)
    }
}

fn parse_path_date(s: &str) -> Result<NaiveDate, ApiError> {
    Ok(parse_iso_date(s)?)
}

fn no_profile() -> ApiError {
    ApiError::NotFound("No profile configured".to_string())
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                    field: None,
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Profile handlers ---

async fn get_profile(State(state): State<AppState>) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .service()
        .get_latest_profile()
        .context("failed to load profile")?
        .ok_or_else(no_profile)?;
    Ok(Json(profile))
}

async fn save_profile(
    State(state): State<AppState>,
    Json(req): Json<SaveProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let form = ProfileForm {
        start_date: required_date("start_date", req.start_date.as_deref())?,
        start_weight: form_text(req.start_weight),
        target_weight: form_text(req.target_weight),
        height: form_text(req.height),
        age: form_text(req.age),
        intensity: form_text(req.intensity),
        start_photo: req.start_photo,
    };
    let saved = state
        .service()
        .save_profile_form(&form)
        .context("failed to save profile")?;
    Ok(Json(saved))
}

// --- Daily log handlers ---

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<DailyLogEntry>>, ApiError> {
    let entries = state
        .service()
        .list_daily_entries()
        .context("database error")?;
    Ok(Json(entries))
}

async fn save_entry(
    State(state): State<AppState>,
    Json(req): Json<SaveEntryRequest>,
) -> Result<(StatusCode, Json<DailyLogEntry>), ApiError> {
    let form = DailyEntryForm {
        date: required_date("date", req.date.as_deref())?,
        weight: form_text(req.weight),
        waist: form_text(req.waist),
        notes: req.notes,
        photo_path: req.photo_path,
    };
    let saved = state
        .service()
        .upsert_daily_form(&form)
        .context("failed to save daily entry")?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<DailyLogEntry>, ApiError> {
    let date = parse_path_date(&date_str)?;
    let entry = state
        .service()
        .get_daily_entry(date)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("No entry for {date_str}")))?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<StatusCode, ApiError> {
    let date = parse_path_date(&date_str)?;
    let deleted = state
        .service()
        .delete_daily_entry(date)
        .context("database error")?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No entry for {date_str}")))
    }
}

async fn latest_weight(
    State(state): State<AppState>,
) -> Result<Json<LatestWeightResponse>, ApiError> {
    let weight = state
        .service()
        .get_latest_recorded_weight()
        .context("database error")?;
    Ok(Json(LatestWeightResponse { weight }))
}

// --- Metrics handlers ---

async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    let dashboard = state
        .service()
        .compute_dashboard()
        .context("failed to compute dashboard")?
        .ok_or_else(no_profile)?;
    Ok(Json(dashboard))
}

async fn chart(
    State(state): State<AppState>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<ChartSeries>, ApiError> {
    let service = state.service();
    let series = match params.start {
        Some(ref s) => service
            .compute_chart_series(parse_iso_date(s)?)
            .context("failed to compute chart")?,
        None => service
            .compute_profile_chart()
            .context("failed to compute chart")?
            .ok_or_else(no_profile)?,
    };
    Ok(Json(series))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/profile", get(get_profile).put(save_profile))
        .route("/api/logs", get(list_entries).post(save_entry))
        .route("/api/logs/{date}", get(get_entry).delete(delete_entry))
        .route("/api/weight/latest", get(latest_weight))
        .route("/api/dashboard", get(dashboard))
        .route("/api/chart", get(chart))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or only its length when the
/// key is too short to abbreviate.
fn api_key_hint(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return format!("<{} characters>", chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    service: MetamorphService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(Mutex::new(service)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        info!(
            "API key: {} (see api_key file in data directory)",
            api_key_hint(key)
        );
    } else {
        warn!("Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(
            "Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(api_key: Option<String>) -> AppState {
        AppState {
            service: Arc::new(Mutex::new(MetamorphService::new_in_memory().unwrap())),
            api_key,
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key))
    }

    fn profile_body() -> serde_json::Value {
        serde_json::json!({
            "start_date": "2024-01-01",
            "start_weight": 100.0,
            "target_weight": 80.0,
            "height": 180.0,
            "age": 30.0,
            "intensity": 0.14
        })
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app.oneshot(get("/api/logs")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_wrong_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/logs")
                    .header("Authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/logs")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app(None);

        let response = app.oneshot(get("/api/logs")).await.unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app(None);

        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/logs")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::from(anyhow::anyhow!("secret database path /home/user/metamorph.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn validation_error_maps_to_400() {
        let err = anyhow::Error::new(ValidationError::Missing { field: "age" }).context("saving");
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "age is required");
        assert_eq!(json["field"], "age");
    }

    #[test]
    fn api_key_hint_abbreviates_long_keys() {
        assert_eq!(api_key_hint("0123456789abcdef"), "0123...cdef");
    }

    #[test]
    fn api_key_hint_short_or_multibyte_keys() {
        assert_eq!(api_key_hint("abc"), "<3 characters>");
        assert_eq!(api_key_hint("ééééé"), "<5 characters>");
        assert_eq!(api_key_hint("éééééééé"), "éééé...éééé");
    }

    #[tokio::test]
    async fn missing_profile_field_returns_400_with_field() {
        let app = test_app(None);
        let mut body = profile_body();
        body.as_object_mut().unwrap().remove("height");

        let response = app
            .oneshot(json_request("PUT", "/api/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "height is required");
        assert_eq!(json["field"], "height");
    }

    #[tokio::test]
    async fn non_numeric_profile_field_returns_400() {
        let app = test_app(None);
        let mut body = profile_body();
        body["age"] = serde_json::json!("thirty");

        let response = app
            .oneshot(json_request("PUT", "/api/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["field"], "age");
    }

    #[tokio::test]
    async fn profile_accepts_numeric_strings() {
        let app = test_app(None);
        let mut body = profile_body();
        body["start_weight"] = serde_json::json!("100,5");
        body["intensity"] = serde_json::json!("aggressive");

        let response = app
            .oneshot(json_request("PUT", "/api/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["start_weight"], 100.5);
        assert_eq!(json["intensity"], 0.2);
    }

    #[tokio::test]
    async fn entry_without_date_returns_400() {
        let app = test_app(None);
        let body = serde_json::json!({ "weight": 90.0 });
        let response = app
            .oneshot(json_request("POST", "/api/logs", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["field"], "date");
    }

    #[tokio::test]
    async fn dashboard_without_profile_returns_404() {
        let app = test_app(None);
        let response = app.oneshot(get("/api/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_then_dashboard() {
        let state = test_state(None);

        let response = build_router(state.clone())
            .oneshot(json_request("PUT", "/api/profile", &profile_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["intensity"], 0.14);

        let response = build_router(state)
            .oneshot(get("/api/dashboard"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["mode"], "Reduction");
        assert_eq!(json["mode_color"], "green");
        assert_eq!(json["calories"], 2383);
        assert_eq!(json["days_left"], 360);
        assert_eq!(json["goal_reached"], false);
    }

    #[tokio::test]
    async fn invalid_profile_returns_400() {
        let app = test_app(None);
        let mut body = profile_body();
        body["height"] = serde_json::json!(0.0);

        let response = app
            .oneshot(json_request("PUT", "/api/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_intensity_returns_400() {
        let app = test_app(None);
        let mut body = profile_body();
        body["intensity"] = serde_json::json!(0.35);

        let response = app
            .oneshot(json_request("PUT", "/api/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_and_get_entry() {
        let state = test_state(None);
        let body = serde_json::json!({
            "date": "2024-01-08",
            "weight": 96.5,
            "waist": 99.0,
            "notes": "first week"
        });

        let response = build_router(state.clone())
            .oneshot(json_request("POST", "/api/logs", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = build_router(state.clone())
            .oneshot(get("/api/logs/2024-01-08"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["weight"], 96.5);
        assert_eq!(json["notes"], "first week");
        assert!(json["photo_path"].is_null());

        let response = build_router(state)
            .oneshot(get("/api/weight/latest"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["weight"], 96.5);
    }

    #[tokio::test]
    async fn negative_weight_returns_400() {
        let app = test_app(None);
        let body = serde_json::json!({ "date": "2024-01-08", "weight": -3.0 });
        let response = app
            .oneshot(json_request("POST", "/api/logs", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_date_returns_400() {
        let app = test_app(None);
        let response = app.oneshot(get("/api/logs/08-01-2024")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_entry_returns_404() {
        let app = test_app(None);
        let response = app.oneshot(get("/api/logs/2024-01-08")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_entry_then_404() {
        let state = test_state(None);
        let body = serde_json::json!({ "date": "2024-01-08", "weight": 96.5 });
        build_router(state.clone())
            .oneshot(json_request("POST", "/api/logs", &body))
            .await
            .unwrap();

        let delete = axum::http::Request::delete("/api/logs/2024-01-08")
            .body(Body::empty())
            .unwrap();
        let response = build_router(state.clone()).oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = build_router(state)
            .oneshot(get("/api/logs/2024-01-08"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chart_uses_profile_start_date() {
        let state = test_state(None);
        build_router(state.clone())
            .oneshot(json_request("PUT", "/api/profile", &profile_body()))
            .await
            .unwrap();
        for (date, weight) in [("2024-01-08", 95.0), ("2024-01-15", 90.0)] {
            let body = serde_json::json!({ "date": date, "weight": weight });
            build_router(state.clone())
                .oneshot(json_request("POST", "/api/logs", &body))
                .await
                .unwrap();
        }

        let response = build_router(state.clone())
            .oneshot(get("/api/chart"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let offsets: Vec<i64> = json["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["day_offset"].as_i64().unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 7, 14]);
        assert_eq!(json["scale"]["axis_min"], 89.0);

        let response = build_router(state)
            .oneshot(get("/api/chart?start=2024-01-08"))
            .await
            .unwrap();
        let json = body_json(response).await;
        let offsets: Vec<i64> = json["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["day_offset"].as_i64().unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 0, 7]);
    }

    #[tokio::test]
    async fn chart_without_profile_or_start_returns_404() {
        let app = test_app(None);
        let response = app.oneshot(get("/api/chart")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
