//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use reqwest::Client;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::{CurrentUser, Superuser};
use crate::config::Config;
use crate::db;
use crate::errors::Result;
use crate::extract::{AppJson, AppQuery};
use crate::models::{
    CharityProject, Donation, DonationCreate, DonationShort, Pagination, ProjectCreate,
    ProjectUpdate, RegisteredUser, User, UserCreate,
};
use crate::sheets::{self, ExportedReport, ReportRow};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub client: Client,
    pub config: Config,
}

/// All routes, without middleware layers.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/users/me", get(me))
        .route("/charity_project", get(list_projects).post(create_project))
        .route(
            "/charity_project/:id",
            patch(update_project).delete(delete_project),
        )
        .route("/donation", get(list_donations).post(create_donation))
        .route("/donation/my", get(my_donations))
        .route("/reports/closed_projects", get(closed_projects_report))
        .route("/google", post(export_google_report))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub count: usize,
    pub projects: Vec<ReportRow>,
}

#[derive(Serialize)]
pub struct ExportResponse {
    #[serde(flatten)]
    pub spreadsheet: ExportedReport,
    pub count: usize,
    pub projects: Vec<ReportRow>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /auth/register`
///
/// Creates a regular user and returns its bearer token.
pub async fn register(
    State(state): State<Arc<ApiState>>,
    AppJson(body): AppJson<UserCreate>,
) -> Result<(StatusCode, Json<RegisteredUser>)> {
    body.validate()?;
    let user = db::create_user(&state.pool, body.email.trim()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `GET /users/me`
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// `GET /charity_project`
pub async fn list_projects(
    State(state): State<Arc<ApiState>>,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Json<Vec<CharityProject>>> {
    let (skip, limit) = page.resolve()?;
    Ok(Json(db::list_projects(&state.pool, skip, limit).await?))
}

/// `POST /charity_project`, superuser only.
///
/// The new project is funded straight away from any open donations.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    _admin: Superuser,
    AppJson(body): AppJson<ProjectCreate>,
) -> Result<(StatusCode, Json<CharityProject>)> {
    body.validate()?;
    let project = db::create_project(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `PATCH /charity_project/:id`, superuser only.
pub async fn update_project(
    State(state): State<Arc<ApiState>>,
    _admin: Superuser,
    Path(id): Path<i64>,
    AppJson(body): AppJson<ProjectUpdate>,
) -> Result<Json<CharityProject>> {
    body.validate()?;
    Ok(Json(db::update_project(&state.pool, id, &body).await?))
}

/// `DELETE /charity_project/:id`, superuser only.
pub async fn delete_project(
    State(state): State<Arc<ApiState>>,
    _admin: Superuser,
    Path(id): Path<i64>,
) -> Result<Json<CharityProject>> {
    Ok(Json(db::delete_project(&state.pool, id).await?))
}

/// `GET /donation`, superuser only (full view).
pub async fn list_donations(
    State(state): State<Arc<ApiState>>,
    _admin: Superuser,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<Json<Vec<Donation>>> {
    let (skip, limit) = page.resolve()?;
    Ok(Json(db::list_donations(&state.pool, skip, limit).await?))
}

/// `POST /donation`
///
/// Records the donation for the caller and spreads it over open projects.
pub async fn create_donation(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<DonationCreate>,
) -> Result<(StatusCode, Json<DonationShort>)> {
    body.validate()?;
    let donation = db::create_donation(&state.pool, user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(donation.into())))
}

/// `GET /donation/my`
pub async fn my_donations(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<DonationShort>>> {
    let donations = db::donations_for_user(&state.pool, user.id).await?;
    Ok(Json(donations.into_iter().map(DonationShort::from).collect()))
}

/// `GET /reports/closed_projects`, superuser only.
///
/// Closed projects, fastest to fund first.
pub async fn closed_projects_report(
    State(state): State<Arc<ApiState>>,
    _admin: Superuser,
) -> Result<Json<ReportResponse>> {
    let projects = db::closed_projects_by_completion_rate(&state.pool).await?;
    let rows = sheets::report_rows(&projects);
    Ok(Json(ReportResponse {
        count: rows.len(),
        projects: rows,
    }))
}

/// `POST /google`, superuser only.
///
/// Exports the closed-projects report to a new Google spreadsheet.
pub async fn export_google_report(
    State(state): State<Arc<ApiState>>,
    _admin: Superuser,
) -> Result<Json<ExportResponse>> {
    let projects = db::closed_projects_by_completion_rate(&state.pool).await?;
    let rows = sheets::report_rows(&projects);
    let spreadsheet = sheets::export_report(&state.client, &state.config, &rows, db::now()).await?;
    Ok(Json(ExportResponse {
        spreadsheet,
        count: rows.len(),
        projects: rows,
    }))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
