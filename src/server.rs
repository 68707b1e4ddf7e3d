//! HTTP boundary.
//!
//! Every route sits behind HTTP basic authentication against a single
//! shared username and password. The guard runs before routing, so
//! unauthenticated requests get the challenge whatever their path or body.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Plan/workout form page (`{"genes": [...]}` with `Accept: application/json`) |
//! | `GET`  | `/static/*` | Browser client assets |
//! | `POST` | `/generate_plan` | Research report + training plan for `{gene, goal}` |
//! | `POST` | `/generate_daily_workout` | One day's workout from an existing plan |
//! | `GET`  | `/health` | Liveness check |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Both gene and goal are required" }
//! ```
//!
//! Validation failures are `400`. Anything raised by a pipeline is logged
//! and reported as `500`. Missing or wrong credentials yield `401` with a
//! `WWW-Authenticate: Basic` challenge.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agent::ResearchAgent;
use crate::config::Config;
use crate::models::{present, HealthMetrics, Marker, Scalar, ValidationError};
use crate::prompts::{self, PromptLibrary};

const INDEX_TEMPLATE: &str = include_str!("../static/index.html");

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    credentials: Arc<Credentials>,
    markers: Arc<Vec<Marker>>,
    static_dir: PathBuf,
    agent: Arc<ResearchAgent>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if no password is configured.
    pub fn new(config: &Config, agent: Arc<ResearchAgent>) -> anyhow::Result<Self> {
        let credentials = Credentials {
            username: config.auth.username.clone(),
            password: config.auth.require_password()?.to_string(),
        };
        Ok(Self {
            credentials: Arc::new(credentials),
            markers: Arc::new(config.markers.allowed.clone()),
            static_dir: config.server.static_dir.clone(),
            agent,
        })
    }
}

struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// Starts the HTTP server.
///
/// Validates the prompt templates and credentials before binding, so a
/// broken deployment fails at startup rather than on the first request.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    PromptLibrary::new(config.prompts.dir.clone()).validate()?;

    let agent = Arc::new(ResearchAgent::from_config(config)?);
    let state = AppState::new(config, agent)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        model = %state.agent.model_name(),
        documents = ?state.agent.document_strategy(),
        "server listening"
    );
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_form))
        .route("/generate_plan", post(handle_generate_plan))
        .route("/generate_daily_workout", post(handle_generate_daily_workout))
        .route("/health", get(handle_health))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Authentication ============

async fn require_basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match basic_credentials(request.headers()) {
        Some((username, password)) if state.credentials.matches(&username, &password) => {
            next.run(request).await
        }
        _ => challenge(),
    }
}

/// Decode an `Authorization: Basic <base64(user:pass)>` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Login Required\"")],
        "Could not verify your access level for that URL.\nYou have to login with proper credentials",
    )
        .into_response()
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        ValidationError::MalformedBody(rejection.body_text()).into()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err),
        }
    }
}

fn handle_panic(_: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error!("handler panicked");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "internal error".to_string(),
    }
    .into_response()
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: "not found".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET / ============

#[derive(Serialize)]
struct FormResponse {
    genes: Vec<Marker>,
}

/// The form page, or the bare marker list for clients that ask for JSON.
async fn handle_form(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    if wants_json {
        let genes = state.markers.as_ref().clone();
        return Ok(Json(FormResponse { genes }).into_response());
    }

    Ok(Html(render_index(&state.markers)?).into_response())
}

fn render_index(markers: &[Marker]) -> anyhow::Result<String> {
    let options = markers
        .iter()
        .map(|m| format!("<option value=\"{0}\">{1}</option>", m, m.as_str().to_uppercase()))
        .collect::<Vec<_>>()
        .join("\n            ");
    prompts::render(INDEX_TEMPLATE, &[("gene_options", &options)])
}

// ============ POST /generate_plan ============

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
}

impl PlanRequest {
    /// Check required fields, then whitelist membership.
    pub fn validate(&self, allowed: &[Marker]) -> Result<(Marker, &str), ValidationError> {
        let gene = self.gene.as_deref().filter(|g| !g.is_empty());
        let goal = self.goal.as_deref().filter(|g| !g.is_empty());
        let (Some(gene), Some(goal)) = (gene, goal) else {
            return Err(ValidationError::MissingPlanFields);
        };
        let marker = Marker::resolve(gene, allowed)?;
        Ok((marker, goal))
    }
}

#[derive(Serialize)]
struct PlanResponse {
    success: bool,
    training_plan: String,
    gene: Marker,
    goal: String,
    research_report: String,
}

async fn handle_generate_plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, AppError> {
    let Json(request) = payload?;
    let (marker, goal) = request.validate(&state.markers)?;

    let plan = state.agent.build_training_plan(goal, marker).await?;

    Ok(Json(PlanResponse {
        success: true,
        training_plan: plan.plan,
        gene: marker,
        goal: goal.to_string(),
        research_report: plan.research_report,
    }))
}

// ============ POST /generate_daily_workout ============

#[derive(Debug, Deserialize)]
pub struct WorkoutRequest {
    #[serde(default)]
    pub training_plan: Option<String>,
    #[serde(default)]
    pub week_number: Option<Scalar>,
    #[serde(default)]
    pub day_of_week: Option<Scalar>,
    #[serde(flatten)]
    pub metrics: HealthMetrics,
}

impl WorkoutRequest {
    /// Returns `(training_plan, week_number, day_of_week)` rendered as text.
    pub fn validate(&self) -> Result<(&str, String, String), ValidationError> {
        let plan = self.training_plan.as_deref().filter(|p| !p.is_empty());
        let week = present(self.week_number.as_ref());
        let day = present(self.day_of_week.as_ref());
        match (plan, week, day) {
            (Some(plan), Some(week), Some(day)) => Ok((plan, week.to_string(), day.to_string())),
            _ => Err(ValidationError::MissingWorkoutFields),
        }
    }
}

#[derive(Serialize)]
struct WorkoutResponse {
    success: bool,
    daily_workout: String,
}

async fn handle_generate_daily_workout(
    State(state): State<AppState>,
    payload: Result<Json<WorkoutRequest>, JsonRejection>,
) -> Result<Json<WorkoutResponse>, AppError> {
    let Json(request) = payload?;
    let (plan, week, day) = request.validate()?;

    let daily_workout = state
        .agent
        .generate_daily_workout(plan, &week, &day, &request.metrics)
        .await?;

    Ok(Json(WorkoutResponse {
        success: true,
        daily_workout,
    }))
}
