use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::country::{Country, CountryFilter, SortKey, StatusSnapshot};
use crate::refresh::{GdpEstimator, Reconciler, RefreshError};
use crate::store::CountryStore;
use crate::upstream::Upstreams;

#[derive(Clone)]
pub struct ApiState {
    db_path: PathBuf,
    image_path: PathBuf,
    reconciler: Reconciler,
}

impl ApiState {
    pub fn new(config: &Config, upstreams: Upstreams) -> Self {
        Self {
            db_path: config.resolved_db_path(),
            image_path: config.resolved_image_path(),
            reconciler: Reconciler::new(upstreams, GdpEstimator::from_config(&config.estimate)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<Value>,
}

impl ApiError {
    fn validation(field: &str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Validation failed".to_string(),
            details: Some(json!({ field: message })),
        }
    }

    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: format!("{what} not found"),
            details: None,
        }
    }

    fn service_unavailable(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "External data source unavailable".to_string(),
            details: Some(Value::String(details.into())),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal server error".to_string(),
            details: Some(Value::String(error.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            error: self.error,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match &err {
            RefreshError::Upstream { upstream, source } => {
                warn!("refresh aborted, {upstream} failed: {source:#}");
                Self::service_unavailable(format!("Could not fetch data from {upstream}"))
            }
            RefreshError::Store(source) | RefreshError::Image { source, .. } => {
                Self::internal(format!("{err}: {source:#}"))
            }
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Clone, Default, Deserialize)]
struct ListQuery {
    region: Option<String>,
    currency: Option<String>,
    sort: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    message: &'static str,
    total_countries: u64,
    inserted: usize,
    updated: usize,
    skipped: usize,
    last_refreshed_at: DateTime<Utc>,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/countries", get(list_countries))
        .route("/countries/refresh", post(refresh))
        .route("/countries/image", get(summary_image))
        .route("/countries/:name", get(get_country).delete(delete_country))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config, upstreams: Upstreams, bind: SocketAddr) -> Result<()> {
    let state = ApiState::new(&config, upstreams);
    // Fail at startup rather than on the first request if the database is unusable.
    CountryStore::open(&state.db_path)?;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn status(State(state): State<ApiState>) -> ApiResult<StatusSnapshot> {
    let store = open_store(&state)?;
    let snapshot = store.status().map_err(ApiError::internal)?;
    Ok(Json(snapshot))
}

async fn refresh(State(state): State<ApiState>) -> ApiResult<RefreshResponse> {
    let summary = state
        .reconciler
        .refresh(&state.db_path, &state.image_path)
        .await?;
    Ok(Json(RefreshResponse {
        message: "Countries refreshed successfully",
        total_countries: summary.total_countries,
        inserted: summary.inserted,
        updated: summary.updated,
        skipped: summary.skipped,
        last_refreshed_at: summary.last_refreshed_at,
    }))
}

async fn list_countries(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Country>> {
    let sort = parse_sort(query.sort.as_deref())?;
    let filter = CountryFilter {
        region: query.region,
        currency: query.currency,
    };
    let store = open_store(&state)?;
    let countries = store.list(&filter, sort).map_err(ApiError::internal)?;
    Ok(Json(countries))
}

async fn get_country(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Country> {
    let store = open_store(&state)?;
    store
        .get(&name)
        .map_err(ApiError::internal)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Country"))
}

async fn delete_country(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<MessageResponse> {
    let store = open_store(&state)?;
    if !store.delete(&name).map_err(ApiError::internal)? {
        return Err(ApiError::not_found("Country"));
    }
    info!("deleted country {name}");
    Ok(Json(MessageResponse {
        message: format!("Country '{name}' deleted successfully"),
    }))
}

async fn summary_image(State(state): State<ApiState>) -> std::result::Result<Response, ApiError> {
    match tokio::fs::read(&state.image_path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(ApiError::not_found("Summary image"))
        }
        Err(err) => {
            error!("failed reading {}: {err}", state.image_path.display());
            Err(ApiError::internal(err))
        }
    }
}

fn parse_sort(raw: Option<&str>) -> std::result::Result<Option<SortKey>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => SortKey::from_str(value)
            .map(Some)
            .map_err(|error| ApiError::validation("sort", error.to_string())),
    }
}

fn open_store(state: &ApiState) -> std::result::Result<CountryStore, ApiError> {
    CountryStore::open(&state.db_path).map_err(ApiError::internal)
}
