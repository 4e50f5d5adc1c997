//! REST API Server for the market research service
//!
//! Exposes the agents, document helpers and cache tables over HTTP for the
//! front end. Analysis endpoints answer from the cache when a row exists for
//! (market, analysis type) and otherwise run the agent and store the result.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, MethodRouter},
    Json, Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::agents::{AnalysisKind, MarketResearcher};
use crate::documents::{content_hash, ChunkRef, DocumentProcessor};
use crate::error::ResearchError;
use crate::store::{PdfRecord, ResearchStore};

const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct MarketRequest {
    pub market: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmarketRequest {
    pub submarket: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_focus_area")]
    pub focus_area: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentQueryRequest {
    pub query: String,
    pub file_chunks: Vec<ChunkRef>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaRequest {
    pub market: String,
    pub timeframe: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub history_type: Option<String>,
    pub search_term: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

fn default_search_depth() -> String {
    "standard".to_string()
}

fn default_focus_area() -> String {
    "general".to_string()
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
            cached: None,
            message: None,
        }
    }

    pub fn analysis(data: String, cached: bool) -> Self {
        Self {
            cached: Some(cached),
            ..Self::success(data)
        }
    }

    pub fn message(message: String) -> Self {
        Self {
            success: true,
            data: serde_json::Value::Null,
            cached: None,
            message: Some(message),
        }
    }
}

/// Error body: `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn not_found(detail: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl From<ResearchError> for ApiError {
    fn from(e: ResearchError) -> Self {
        let status = match &e {
            ResearchError::NotFound(_) => StatusCode::NOT_FOUND,
            ResearchError::InvalidInput(_) | ResearchError::PdfError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", e);
        }
        Self::new(status, e.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::bad_request(format!("Invalid multipart body: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult = std::result::Result<Json<ApiResponse>, ApiError>;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub store: ResearchStore,
    pub researcher: Arc<MarketResearcher>,
    pub documents: Arc<DocumentProcessor>,
}

fn required<'a>(value: &'a str, field: &str) -> std::result::Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "message": "DB-backed API is running!",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// =============================
/// Market Analysis Endpoints
/// =============================

async fn cached_analysis(state: &ApiState, kind: AnalysisKind, req: MarketRequest) -> ApiResult {
    let market = required(&req.market, "market")?;

    if let Some(cached) = state.store.latest_analysis(market, kind).await? {
        info!(market, kind = kind.tag(), "Serving cached analysis");
        if kind == AnalysisKind::Global {
            state
                .store
                .log_event("market_analysis_cached", &json!({ "market": market }))
                .await?;
        }
        return Ok(Json(ApiResponse::analysis(cached.data, true)));
    }

    let result = state.researcher.analyze(kind, market).await;
    state.store.insert_analysis(market, kind, &result).await?;
    if kind == AnalysisKind::Global {
        state
            .store
            .log_event("market_analysis", &json!({ "market": market }))
            .await?;
    }

    Ok(Json(ApiResponse::analysis(result, false)))
}

fn analysis_route(kind: AnalysisKind) -> MethodRouter<ApiState> {
    post(
        move |State(state): State<ApiState>, Json(req): Json<MarketRequest>| async move {
            cached_analysis(&state, kind, req).await
        },
    )
}

async fn detailed_metrics(
    State(state): State<ApiState>,
    Json(req): Json<MarketRequest>,
) -> ApiResult {
    let market = required(&req.market, "market")?;
    let result = state.researcher.detailed_metrics(market).await?;
    Ok(Json(ApiResponse::success(result)))
}

async fn top_companies(
    State(state): State<ApiState>,
    Json(req): Json<SubmarketRequest>,
) -> ApiResult {
    let submarket = required(&req.submarket, "submarket")?;
    let result = state.researcher.top_companies(submarket).await?;
    Ok(Json(ApiResponse::success(result)))
}

async fn web_research(State(state): State<ApiState>, Json(req): Json<QueryRequest>) -> ApiResult {
    let query = required(&req.query, "query")?;
    info!(
        depth = %req.search_depth,
        focus = %req.focus_area,
        "Web research request"
    );

    let result = state.researcher.web_insights(query).await;
    state
        .store
        .log_event("web_research", &json!({ "query": query }))
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// =============================
/// Document Endpoints
/// =============================

async fn upload_document(State(state): State<ApiState>, mut multipart: Multipart) -> ApiResult {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("document.pdf").to_string();
            let bytes = field.bytes().await?;
            upload = Some((filename, bytes.to_vec()));
        }
    }
    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("missing 'file' field"))?;

    let pdf_id = content_hash(&bytes);
    if let Some(existing) = state.store.find_pdf(&pdf_id).await? {
        info!(pdf_id = %pdf_id, "Document already processed");
        return Ok(Json(ApiResponse::success(json!({
            "chunks": existing.chunks,
            "pdf_id": existing.pdf_id,
        }))));
    }

    let chunks = state.documents.split_and_upload(&filename, bytes).await?;
    state.store.insert_pdf(&pdf_id, &filename, &chunks).await?;

    Ok(Json(ApiResponse::success(json!({
        "chunks": chunks,
        "pdf_id": pdf_id,
    }))))
}

async fn query_document(
    State(state): State<ApiState>,
    Json(req): Json<DocumentQueryRequest>,
) -> ApiResult {
    let query = required(&req.query, "query")?;
    let result = state.documents.query_chunks(query, &req.file_chunks).await;
    Ok(Json(ApiResponse::success(result)))
}

async fn compare_documents(State(state): State<ApiState>, mut multipart: Multipart) -> ApiResult {
    let mut files = Vec::new();
    let mut prompt = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("files") => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("document-{}.pdf", files.len() + 1));
                let bytes = field.bytes().await?;
                files.push((name, bytes.to_vec()));
            }
            Some("prompt") => prompt = Some(field.text().await?),
            _ => {}
        }
    }

    let prompt = prompt.ok_or_else(|| ApiError::bad_request("missing 'prompt' field"))?;
    let prompt = required(&prompt, "prompt")?;
    if files.is_empty() {
        return Err(ApiError::bad_request("missing 'files' field"));
    }

    let results = state.documents.compare(files, prompt).await?;
    Ok(Json(ApiResponse::success(results)))
}

/// =============================
/// M&A Endpoints
/// =============================

async fn ma_deals(State(state): State<ApiState>, Json(req): Json<MaRequest>) -> ApiResult {
    let market = required(&req.market, "market")?;
    let timeframe = required(&req.timeframe, "timeframe")?;

    let result = state.researcher.mergers(market, timeframe).await;
    state.store.insert_ma_search(market, timeframe, &result).await?;
    Ok(Json(ApiResponse::success(result)))
}

async fn recent_ma_searches(
    State(state): State<ApiState>,
    Query(params): Query<LimitParams>,
) -> ApiResult {
    let rows = state
        .store
        .recent_ma_searches(params.limit.unwrap_or(10).max(0))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// =============================
/// Admin Endpoints
/// =============================

async fn database_stats(State(state): State<ApiState>) -> ApiResult {
    Ok(Json(ApiResponse::success(state.store.stats().await?)))
}

/// Start of a look-back window of `days` days, 7 when unset.
fn window_start(days: Option<i64>) -> std::result::Result<DateTime<Utc>, ApiError> {
    let days = days.unwrap_or(7);
    ChronoDuration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| ApiError::bad_request(format!("days out of range: {}", days)))
}

async fn analytics(State(state): State<ApiState>, Query(params): Query<WindowParams>) -> ApiResult {
    let cutoff = window_start(params.days)?;
    Ok(Json(ApiResponse::success(
        state.store.analytics_summary(cutoff).await?,
    )))
}

/// =============================
/// History & Restore Endpoints
/// =============================

fn pdf_summary(record: &PdfRecord) -> serde_json::Value {
    json!({
        "id": record.pdf_id,
        "pdf_id": record.pdf_id,
        "file_name": record.filename,
        "chunks_count": record.chunks.len(),
        "processed_at": record.processed_at.to_rfc3339(),
    })
}

async fn market_history(
    State(state): State<ApiState>,
    Json(req): Json<HistoryRequest>,
) -> ApiResult {
    // "All" and unknown labels mean no type filter.
    let kind = req
        .history_type
        .as_deref()
        .and_then(|t| t.parse::<AnalysisKind>().ok());

    let rows = state
        .store
        .market_history(req.search_term.as_deref(), kind, req.limit.unwrap_or(20).max(0))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn pdf_history(State(state): State<ApiState>, Json(req): Json<HistoryRequest>) -> ApiResult {
    let rows = state
        .store
        .pdf_history(req.search_term.as_deref(), req.limit.unwrap_or(20).max(0))
        .await?;
    let history: Vec<_> = rows.iter().map(pdf_summary).collect();
    Ok(Json(ApiResponse::success(history)))
}

async fn popular_markets(
    State(state): State<ApiState>,
    Query(params): Query<WindowParams>,
) -> ApiResult {
    let cutoff = window_start(params.days)?;
    let rows = state
        .store
        .popular_markets(cutoff, params.limit.unwrap_or(10).max(0))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn restore_market(
    State(state): State<ApiState>,
    Path(market_name): Path<String>,
) -> ApiResult {
    let restored = state.store.restore_market(&market_name).await?;
    if restored.is_empty() {
        return Err(ApiError::not_found("Market analysis not found"));
    }
    Ok(Json(ApiResponse::success(restored)))
}

async fn restore_pdf(State(state): State<ApiState>, Path(pdf_id): Path<String>) -> ApiResult {
    let record = state
        .store
        .find_pdf(&pdf_id)
        .await?
        .ok_or_else(|| ApiError::not_found("PDF session not found"))?;

    let mut info = pdf_summary(&record);
    if let Some(map) = info.as_object_mut() {
        map.remove("pdf_id");
    }

    Ok(Json(ApiResponse::success(json!({
        "pdf_info": info,
        "qa_history": [],
        "chunks": record.chunks,
    }))))
}

async fn delete_market(State(state): State<ApiState>, Path(market_id): Path<i64>) -> ApiResult {
    if !state.store.delete_analysis(market_id).await? {
        return Err(ApiError::not_found("Market history not found"));
    }
    Ok(Json(ApiResponse::message(format!(
        "Deleted market history id={}",
        market_id
    ))))
}

async fn delete_pdf(State(state): State<ApiState>, Path(pdf_id): Path<String>) -> ApiResult {
    if !state.store.delete_pdf(&pdf_id).await? {
        return Err(ApiError::not_found("PDF history not found"));
    }
    Ok(Json(ApiResponse::message(format!(
        "Deleted PDF history pdf_id={}",
        pdf_id
    ))))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    let documents = Router::new()
        .route("/api/documents/upload-and-split", post(upload_document))
        .route("/api/documents/compare", post(compare_documents))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/market/global-overview", analysis_route(AnalysisKind::Global))
        .route("/api/market/vertical-segments", analysis_route(AnalysisKind::Vertical))
        .route("/api/market/horizontal-markets", analysis_route(AnalysisKind::Horizontal))
        .route("/api/market/applications", analysis_route(AnalysisKind::Applications))
        .route(
            "/api/market/technology-segments",
            analysis_route(AnalysisKind::TechnologySegments),
        )
        .route("/api/market/regional-analysis", analysis_route(AnalysisKind::Regional))
        .route("/api/market/end-user-analysis", analysis_route(AnalysisKind::EndUser))
        .route(
            "/api/market/product-categories",
            analysis_route(AnalysisKind::ProductCategories),
        )
        .route(
            "/api/market/related-markets",
            analysis_route(AnalysisKind::RelatedMarkets),
        )
        .route("/api/market/detailed-metrics", post(detailed_metrics))
        .route("/api/company/top-companies", post(top_companies))
        .route("/api/research/web-insights", post(web_research))
        .route("/api/documents/query", post(query_document))
        .merge(documents)
        .route("/api/ma/analyze-deals", post(ma_deals))
        .route("/api/ma/recent-searches", get(recent_ma_searches))
        .route("/api/admin/database-stats", get(database_stats))
        .route("/api/admin/analytics", get(analytics))
        .route("/api/history/market-analysis", post(market_history))
        .route("/api/history/pdf-sessions", post(pdf_history))
        .route("/api/history/popular-markets", get(popular_markets))
        .route("/api/restore/market-analysis/:market_name", post(restore_market))
        .route("/api/restore/pdf-session/:pdf_id", post(restore_pdf))
        .route("/api/history/delete-market/:market_id", delete(delete_market))
        .route("/api/history/delete-pdf/:pdf_id", delete(delete_pdf))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
