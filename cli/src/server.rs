use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::assistant::{ActionError, Assistant};
use crate::images::{ImageKind, MAX_IMAGE_BYTES};
use nutrisense_core::db::Database;
use nutrisense_core::diary::{DiarySettings, NewHealthLog, classify_readings};
use nutrisense_core::models::{
    NewBloodSugarReading, NewFoodLog, NewMealSuggestion, NewNutritionalGap, ProfileUpdate,
    UserConditions, validate_user_id,
};
use nutrisense_core::planner::PlanRequest;
use nutrisense_core::prompt::CHAT_ERROR_REPLY;
use nutrisense_core::scan::ScanOutput;

// Room for a full-size image plus multipart framing.
const BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;
const DEFAULT_READING_LIMIT: i64 = 20;

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    assistant: Arc<Assistant>,
    api_key: Option<String>,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateProfileRequest {
    email: String,
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessageRequest {
    content: String,
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct FoodAnalysisRequest {
    user_prompt: String,
    scan_output: ScanOutput,
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    scan_output: ScanOutput,
    #[serde(default)]
    user_prompt: String,
    #[serde(default)]
    conditions: UserConditions,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    analysis: String,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Upstream(anyhow::Error),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Upstream(err) => {
                warn!("Upstream service error: {err:#}");
                (StatusCode::BAD_GATEWAY, CHAT_ERROR_REPLY.to_string())
            }
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<ActionError> for ApiError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Invalid(e) => Self::BadRequest(format!("{e:#}")),
            ActionError::NotFound(msg) => Self::NotFound(msg),
            ActionError::Upstream(e) => Self::Upstream(e),
            ActionError::Internal(e) => Self::Internal(e),
        }
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err:#}"))
}

/// Validate a path user id and check the profile exists. Returns the
/// canonical id.
fn require_user(db: &Database, user_id: &str) -> Result<String, ApiError> {
    let user_id = validate_user_id(user_id).map_err(|e| bad_request(&e))?;
    if db.get_profile(&user_id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("Profile {user_id} not found")));
    }
    Ok(user_id)
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate, ApiError> {
    match date {
        None => Ok(Local::now().date_naive()),
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{d}'. Use YYYY-MM-DD"))),
    }
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

// --- Profiles ---

async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(ApiError::BadRequest(format!("Invalid email '{email}'")));
    }
    let db = state.db();
    if db
        .find_profile_by_email(email)
        .context("database error")?
        .is_some()
    {
        return Err(ApiError::BadRequest(format!(
            "A profile for {email} already exists"
        )));
    }
    let full_name = req.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let profile = db
        .create_profile(email, full_name)
        .context("failed to create profile")?;
    info!(user = %profile.id, "profile created");
    let value = serde_json::to_value(profile).context("failed to serialize profile")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = state.assistant.get_user_profile(&id)?;
    Ok(Json(
        serde_json::to_value(profile).context("failed to serialize profile")?,
    ))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut update): Json<ProfileUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    update.normalize().map_err(|e| bad_request(&e))?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let profile = db
        .update_profile(&user_id, &update)
        .context("failed to update profile")?;
    info!(user = %user_id, "onboarding saved");
    Ok(Json(
        serde_json::to_value(profile).context("failed to serialize profile")?,
    ))
}

// --- Chat ---

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.assistant.chat_session(&id)?;
    Ok(Json(
        serde_json::to_value(session).context("failed to serialize chat")?,
    ))
}

async fn post_chat_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reply = state
        .assistant
        .send_user_message(&id, &req.content, req.image_url.as_deref())
        .await?;
    Ok(Json(
        serde_json::to_value(reply).context("failed to serialize reply")?,
    ))
}

async fn post_chat_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FoodAnalysisRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reply = state
        .assistant
        .send_food_analysis_message(&id, &req.user_prompt, &req.scan_output, req.image_url.as_deref())
        .await?;
    Ok(Json(
        serde_json::to_value(reply).context("failed to serialize reply")?,
    ))
}

async fn post_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let analysis = state
        .assistant
        .analyze_food(&req.scan_output, &req.user_prompt, &req.conditions)
        .await;
    Json(AnalyzeResponse { analysis })
}

// --- Scan & images ---

async fn post_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut upload: Option<(Vec<u8>, ImageKind)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let kind = ImageKind::from_content_type(&content_type).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Unsupported image type: {content_type}. Use JPEG, PNG or WebP"
            ))
        })?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
        upload = Some((bytes.to_vec(), kind));
    }

    let (bytes, kind) =
        upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    let result = state.assistant.scan_image(&id, &bytes, kind).await?;
    Ok(Json(
        serde_json::to_value(result).context("failed to serialize scan")?,
    ))
}

async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let (bytes, kind) = state
        .assistant
        .images()
        .load(&name)?
        .ok_or_else(|| ApiError::NotFound(format!("Image '{name}' not found")))?;
    Ok(([(header::CONTENT_TYPE, kind.content_type())], bytes).into_response())
}

// --- Food logs ---

async fn create_food_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut log): Json<NewFoodLog>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    log.normalize().map_err(|e| bad_request(&e))?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let entry = db
        .insert_food_log(&user_id, &log)
        .context("failed to insert food log")?;
    let value = serde_json::to_value(entry).context("failed to serialize food log")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_food_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date(query.date.as_deref())?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let logs = db
        .get_food_logs_for_date(&user_id, date)
        .context("failed to list food logs")?;
    Ok(Json(
        serde_json::to_value(logs).context("failed to serialize food logs")?,
    ))
}

async fn delete_food_log(
    State(state): State<AppState>,
    Path((id, log_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    if db
        .delete_food_log(&user_id, &log_id)
        .context("failed to delete food log")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Food log {log_id} not found")))
    }
}

async fn food_log_summary(
    State(state): State<AppState>,
    Path((id, date)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date(Some(&date))?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let totals = db
        .daily_totals(&user_id, date)
        .context("failed to compute daily totals")?;
    Ok(Json(
        serde_json::to_value(totals).context("failed to serialize totals")?,
    ))
}

// --- Blood sugar ---

async fn create_blood_sugar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut reading): Json<NewBloodSugarReading>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    reading.normalize().map_err(|e| bad_request(&e))?;
    let profile = state.assistant.get_user_profile(&id)?;
    let mut saved = state
        .db()
        .insert_blood_sugar(&profile.id, &reading)
        .context("failed to insert reading")?;
    classify_readings(std::slice::from_mut(&mut saved), &profile);
    let value = serde_json::to_value(saved).context("failed to serialize reading")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_blood_sugar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_READING_LIMIT);
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be positive".to_string()));
    }
    let profile = state.assistant.get_user_profile(&id)?;
    let mut readings = state
        .db()
        .get_blood_sugar_history(&profile.id, limit)
        .context("failed to list readings")?;
    classify_readings(&mut readings, &profile);
    Ok(Json(
        serde_json::to_value(readings).context("failed to serialize readings")?,
    ))
}

// --- Health diary ---

async fn get_diary_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DiarySettings>, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let settings = db
        .get_diary_settings(&user_id)
        .context("failed to load diary settings")?
        .ok_or_else(|| ApiError::NotFound("No diary settings saved yet".to_string()))?;
    Ok(Json(settings))
}

async fn put_diary_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DiarySettings>,
) -> Result<Json<DiarySettings>, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let settings = db
        .upsert_diary_settings(&user_id, req.goal, req.tracking_frequency)
        .context("failed to save diary settings")?;
    Ok(Json(settings))
}

async fn create_health_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<NewHealthLog>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let metrics = form.validate().map_err(|e| bad_request(&e))?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let log = db
        .insert_health_log(&user_id, &metrics)
        .context("failed to save health log")?;
    let value = serde_json::to_value(log).context("failed to serialize health log")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn diary_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if query.limit.is_some_and(|n| n <= 0) {
        return Err(ApiError::BadRequest("limit must be positive".into()));
    }
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let timeline = db
        .health_timeline(&user_id, query.limit, Local::now())
        .context("failed to build timeline")?;
    Ok(Json(
        serde_json::to_value(timeline).context("failed to serialize timeline")?,
    ))
}

// --- Meal plans ---

async fn generate_meal_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PlanRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let plan = state.assistant.generate_meal_plan(&id, req).await?;
    let value = serde_json::to_value(plan).context("failed to serialize meal plan")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_meal_plans(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let plans = db
        .list_meal_plans(&user_id)
        .context("failed to list meal plans")?;
    Ok(Json(
        serde_json::to_value(plans).context("failed to serialize meal plans")?,
    ))
}

async fn get_meal_plan(
    State(state): State<AppState>,
    Path((id, plan_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let plan = db
        .get_meal_plan(&user_id, &plan_id)
        .context("failed to load meal plan")?
        .ok_or_else(|| ApiError::NotFound(format!("Meal plan {plan_id} not found")))?;
    Ok(Json(
        serde_json::to_value(plan).context("failed to serialize meal plan")?,
    ))
}

async fn delete_meal_plan(
    State(state): State<AppState>,
    Path((id, plan_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    if db
        .delete_meal_plan(&user_id, &plan_id)
        .context("failed to delete meal plan")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Meal plan {plan_id} not found")))
    }
}

// --- Meal suggestions & nutritional gaps ---

async fn create_meal_suggestion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut suggestion): Json<NewMealSuggestion>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    suggestion.normalize().map_err(|e| bad_request(&e))?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let saved = db
        .insert_meal_suggestion(&user_id, &suggestion)
        .context("failed to save meal suggestion")?;
    let value = serde_json::to_value(saved).context("failed to serialize meal suggestion")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_meal_suggestions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let suggestions = db
        .list_meal_suggestions(&user_id)
        .context("failed to list meal suggestions")?;
    Ok(Json(
        serde_json::to_value(suggestions).context("failed to serialize meal suggestions")?,
    ))
}

async fn create_nutritional_gap(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut gap): Json<NewNutritionalGap>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    gap.normalize().map_err(|e| bad_request(&e))?;
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let saved = db
        .insert_nutritional_gap(&user_id, &gap)
        .context("failed to save nutritional gap")?;
    let value = serde_json::to_value(saved).context("failed to serialize nutritional gap")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_nutritional_gaps(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db();
    let user_id = require_user(&db, &id)?;
    let gaps = db
        .list_nutritional_gaps(&user_id)
        .context("failed to list nutritional gaps")?;
    Ok(Json(
        serde_json::to_value(gaps).context("failed to serialize nutritional gaps")?,
    ))
}

async fn health() -> &'static str {
    "ok"
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/profiles", post(create_profile))
        .route("/api/profiles/{id}", get(get_profile).put(update_profile))
        .route("/api/users/{id}/chat", get(get_chat))
        .route("/api/users/{id}/chat/messages", post(post_chat_message))
        .route("/api/users/{id}/chat/analysis", post(post_chat_analysis))
        .route("/api/users/{id}/scan", post(post_scan))
        .route("/api/analyze", post(post_analyze))
        .route(
            "/api/users/{id}/food-logs",
            post(create_food_log).get(list_food_logs),
        )
        .route(
            "/api/users/{id}/food-logs/{log_id}",
            delete(delete_food_log),
        )
        .route(
            "/api/users/{id}/food-logs/summary/{date}",
            get(food_log_summary),
        )
        .route(
            "/api/users/{id}/blood-sugar",
            post(create_blood_sugar).get(list_blood_sugar),
        )
        .route(
            "/api/users/{id}/diary/settings",
            get(get_diary_settings).put(put_diary_settings),
        )
        .route(
            "/api/users/{id}/diary/logs",
            post(create_health_log).get(diary_timeline),
        )
        .route(
            "/api/users/{id}/meal-plans/generate",
            post(generate_meal_plan),
        )
        .route("/api/users/{id}/meal-plans", get(list_meal_plans))
        .route(
            "/api/users/{id}/meal-plans/{plan_id}",
            get(get_meal_plan).delete(delete_meal_plan),
        )
        .route(
            "/api/users/{id}/meal-suggestions",
            post(create_meal_suggestion).get(list_meal_suggestions),
        )
        .route(
            "/api/users/{id}/nutritional-gaps",
            post(create_nutritional_gap).get(list_nutritional_gaps),
        )
        .route("/api/images/{name}", get(get_image))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key; short keys are hidden entirely.
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    db: Arc<Mutex<Database>>,
    assistant: Arc<Assistant>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        db,
        assistant,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    match api_key {
        Some(ref key) if new_api_key => {
            eprintln!("Generated new API key: {key}");
            eprintln!("Include in requests: Authorization: Bearer {key}");
        }
        Some(ref key) => eprintln!(
            "API key: {} (see api_key file in data directory)",
            mask_api_key(key)
        ),
        None => eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone."),
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
