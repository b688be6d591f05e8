//! REST API over the catalog service.

use std::env;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use govcat_core::catalog::{CatalogSource, StoreError};
use govcat_core::{
    CatalogClient, CatalogError, CatalogService, CatalogStore, ConfigError, FetchError,
    LocalFilter, MemoryCatalogStore, PortalConfig,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// The source the server drives: the live portal client, or a stand-in.
pub type SharedSource = Box<dyn CatalogSource + Send + Sync>;
type Catalog = CatalogService<SharedSource, MemoryCatalogStore>;

const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_SYNC_PAGES: u32 = 10;

// ---------------------------------------------------------------------------
// Configuration and state
// ---------------------------------------------------------------------------

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Listing page size used by bulk sync.
    pub sync_page_size: u32,
    pub portal: PortalConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3847,
            sync_page_size: 30,
            portal: PortalConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `GOVCAT_PORT`, `GOVCAT_SYNC_PAGE_SIZE` and the
    /// portal's own `GOVCAT_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            portal: PortalConfig::from_env()?,
            ..Self::default()
        };
        if let Ok(v) = env::var("GOVCAT_PORT") {
            config.port = v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "GOVCAT_PORT",
                value: v.clone(),
            })?;
        }
        if let Ok(v) = env::var("GOVCAT_SYNC_PAGE_SIZE") {
            config.sync_page_size = v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "GOVCAT_SYNC_PAGE_SIZE",
                value: v.clone(),
            })?;
        }
        Ok(config)
    }
}

/// Shared server state.
pub struct AppState {
    config: ServerConfig,
    /// Built on first use, on a blocking thread: the HTTP client owns a
    /// runtime of its own and cannot be created inside an async context.
    catalog: Mutex<Option<Arc<Catalog>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            catalog: Mutex::new(None),
        }
    }

    /// State backed by `source` instead of the live portal.
    pub fn with_source(config: ServerConfig, source: SharedSource) -> Self {
        let catalog = CatalogService::new(source, MemoryCatalogStore::new());
        Self {
            config,
            catalog: Mutex::new(Some(Arc::new(catalog))),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn catalog(&self) -> Result<Arc<Catalog>, ApiError> {
        let mut slot = self
            .catalog
            .lock()
            .map_err(|e| ApiError::internal(e.to_string()))?;
        if let Some(catalog) = slot.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let client = CatalogClient::new(self.config.portal.clone())
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let source: SharedSource = Box::new(client);
        let catalog = Arc::new(CatalogService::new(source, MemoryCatalogStore::new()));
        *slot = Some(Arc::clone(&catalog));
        Ok(catalog)
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub category: Option<String>,
    pub org: Option<String>,
    /// `local` searches stored records only; anything else searches the portal.
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub max_pages: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        let status = match &e {
            CatalogError::Fetch(FetchError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            CatalogError::Fetch(FetchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            CatalogError::Fetch(
                FetchError::Network(_) | FetchError::Status(_) | FetchError::Decode(_),
            ) => StatusCode::BAD_GATEWAY,
            CatalogError::Store(StoreError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

fn validate_paging(page: u32, size: u32) -> Result<(), ApiError> {
    if page == 0 {
        return Err(ApiError::bad_request("page must be 1 or greater"));
    }
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ApiError::bad_request(format!(
            "size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("catalog id must be numeric"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Blocking helper
// ---------------------------------------------------------------------------

/// Run a closure on a blocking thread and return its response.
///
/// Every engine call goes through `reqwest::blocking`, so handlers never run
/// it on an async worker.
async fn run_blocking<F>(f: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/catalog", get(list_catalog))
        .route("/api/catalog/search", get(search))
        .route("/api/catalog/categories", get(categories))
        .route("/api/catalog/orgs", get(orgs))
        .route("/api/catalog/sync", post(sync))
        .route("/api/catalog/{id}", get(detail))
        .route("/api/catalog/{id}/refresh", post(refresh))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> &'static str {
    "ok"
}

/// GET /api/catalog/search?keyword=&page=&size=&category=&org=&source=
///
/// A portal search that fails is answered from stored records.
async fn search(State(state): State<Arc<AppState>>, Query(query): Query<SearchQuery>) -> Response {
    let page = query.page.unwrap_or(1);
    let size = query.size.unwrap_or(10);
    if let Err(e) = validate_paging(page, size) {
        return e.into_response();
    }
    let local_only = query.source.as_deref() == Some("local");
    let filter = LocalFilter {
        keyword: query.keyword,
        category: query.category,
        org: query.org,
    };

    run_blocking(move || {
        respond(state.catalog().and_then(|catalog| {
            let result = if local_only {
                catalog.search_local(&filter, page, size)
            } else {
                catalog.search_with_fallback(&filter, page, size)
            };
            Ok(result?)
        }))
    })
    .await
}

/// GET /api/catalog/categories
async fn categories(State(state): State<Arc<AppState>>) -> Response {
    run_blocking(move || respond(state.catalog().and_then(|c| Ok(c.categories()?)))).await
}

/// GET /api/catalog/orgs
async fn orgs(State(state): State<Arc<AppState>>) -> Response {
    run_blocking(move || respond(state.catalog().and_then(|c| Ok(c.orgs()?)))).await
}

/// GET /api/catalog/{id}
async fn detail(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Err(e) = validate_id(&id) {
        return e.into_response();
    }
    run_blocking(move || respond(state.catalog().and_then(|c| Ok(c.detail(&id)?)))).await
}

/// POST /api/catalog/{id}/refresh
async fn refresh(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Err(e) = validate_id(&id) {
        return e.into_response();
    }
    run_blocking(move || respond(state.catalog().and_then(|c| Ok(c.refresh(&id)?)))).await
}

/// POST /api/catalog/sync?max_pages=&page_size=
async fn sync(State(state): State<Arc<AppState>>, Query(query): Query<SyncQuery>) -> Response {
    let max_pages = query.max_pages.unwrap_or(DEFAULT_SYNC_PAGES);
    let page_size = query.page_size.unwrap_or(state.config().sync_page_size);
    if let Err(e) = validate_paging(max_pages, page_size) {
        return e.into_response();
    }

    run_blocking(move || {
        respond(
            state
                .catalog()
                .and_then(|c| Ok(c.sync(max_pages, page_size)?)),
        )
    })
    .await
}

/// GET /api/catalog
async fn list_catalog(State(state): State<Arc<AppState>>) -> Response {
    run_blocking(move || {
        respond(state.catalog().and_then(|c| {
            c.store()
                .list()
                .map_err(|e| ApiError::from(CatalogError::from(e)))
        }))
    })
    .await
}
