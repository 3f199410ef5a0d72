//! 종목 API.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/stocks/search?query=` - 종목코드/종목명 검색
//! - `GET /api/v1/stocks/chart?code=&type=&timeFrame=&count=` - 일봉/분봉 차트
//! - `POST /api/v1/stocks/master/upload` - KOSPI 종목 마스터 파일 적재 (관리자)

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use brief_core::StockInfo;
use brief_data::master_file::load_master_file;
use brief_data::storage::stock_master::DEFAULT_SEARCH_LIMIT;
use brief_data::StockMasterRepository;
use brief_exchange::{ChartData, ChartQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use super::validate_stock_code;
use crate::auth::{AdminAuth, JwtAuth};
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 종목 검색 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
pub struct StockSearchQuery {
    /// 종목코드 또는 종목명 일부
    #[serde(default)]
    pub query: String,
}

/// 종목 검색 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockSearchResponse {
    pub stocks: Vec<StockInfo>,
}

/// 차트 조회 쿼리.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ChartParams {
    /// 종목코드
    #[serde(default)]
    pub code: String,
    /// "daily" (기본) | "minute"
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
    /// 분봉 단위 (분, 기본 30)
    pub time_frame: Option<u32>,
    /// 분봉 건수 (기본 100)
    pub count: Option<u32>,
}

/// 차트 응답.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub success: bool,
    /// `{type, candles}`
    #[schema(value_type = Object)]
    pub chart_data: ChartData,
}

/// 종목 마스터 적재 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MasterUploadResponse {
    pub message: String,
    /// 적재한 종목 수 (중복 제거 후)
    pub count: usize,
}

impl ChartParams {
    fn to_query(&self) -> ApiResult<ChartQuery> {
        match self.chart_type.as_deref().unwrap_or("daily") {
            "daily" => Ok(ChartQuery::daily_default()),
            "minute" => Ok(ChartQuery::minute(self.time_frame, self.count)?),
            other => Err(ApiError::validation(format!(
                "지원하지 않는 차트 타입입니다: {}",
                other
            ))),
        }
    }
}

/// 종목 검색.
///
/// 종목 마스터를 먼저 찾고, 데이터베이스가 없거나 결과가 없으면 포털 검색
/// 결과를 사용합니다.
#[utoipa::path(
    get,
    path = "/api/v1/stocks/search",
    params(StockSearchQuery),
    responses(
        (status = 200, description = "검색 결과", body = StockSearchResponse),
        (status = 400, description = "검색어 누락", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stocks"
)]
pub async fn search_stocks(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Query(query): Query<StockSearchQuery>,
) -> ApiResult<Json<StockSearchResponse>> {
    let keyword = query.query.trim();
    if keyword.is_empty() {
        return Err(ApiError::validation("검색어를 입력해주세요."));
    }

    if let Some(pool) = &state.db_pool {
        let stocks = StockMasterRepository::search(pool, keyword, DEFAULT_SEARCH_LIMIT).await?;
        if !stocks.is_empty() {
            return Ok(Json(StockSearchResponse { stocks }));
        }
        debug!(keyword, "No stock master match, falling back to portal search");
    }

    let mut stocks = state.crawler.search_stocks(keyword).await?;
    stocks.truncate(DEFAULT_SEARCH_LIMIT as usize);
    Ok(Json(StockSearchResponse { stocks }))
}

/// 일봉/분봉 차트 조회.
#[utoipa::path(
    get,
    path = "/api/v1/stocks/chart",
    params(ChartParams),
    responses(
        (status = 200, description = "차트 데이터", body = ChartResponse),
        (status = 400, description = "잘못된 종목코드 또는 차트 조건", body = ApiErrorResponse),
        (status = 502, description = "증권사 API 실패", body = ApiErrorResponse),
        (status = 503, description = "KIS 미설정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stocks"
)]
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Query(params): Query<ChartParams>,
) -> ApiResult<Json<ChartResponse>> {
    if params.code.trim().is_empty() {
        return Err(ApiError::validation("종목코드가 필요합니다."));
    }
    validate_stock_code(params.code.trim())
        .map_err(|_| ApiError::validation("종목코드는 6자리 숫자여야 합니다"))?;
    let query = params.to_query()?;

    let client = state
        .kis_client
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("KIS API가 설정되지 않았습니다"))?;

    let chart_data = client.chart(params.code.trim(), query).await?;
    debug!(stock_code = %params.code, count = chart_data.len(), "Chart fetched");

    Ok(Json(ChartResponse {
        success: true,
        chart_data,
    }))
}

/// 종목 마스터 파일 적재.
#[utoipa::path(
    post,
    path = "/api/v1/stocks/master/upload",
    responses(
        (status = 200, description = "적재 완료", body = MasterUploadResponse),
        (status = 403, description = "관리자 권한 필요", body = ApiErrorResponse),
        (status = 500, description = "파일 읽기 또는 저장 실패", body = ApiErrorResponse),
        (status = 503, description = "데이터베이스 미설정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stocks"
)]
pub async fn upload_master(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
) -> ApiResult<Json<MasterUploadResponse>> {
    let pool = state
        .db_pool
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("데이터베이스가 설정되지 않았습니다"))?;

    let path = &state.config.master_file.kospi_path;
    let items = load_master_file(path).await.inspect_err(|e| {
        warn!(path = %path, error = %e, "Master file load failed");
    })?;
    StockMasterRepository::upsert_batch(pool, &items).await?;

    info!(user = %claims.email, count = items.len(), "Stock master uploaded");
    Ok(Json(MasterUploadResponse {
        message: "종목 마스터 등록 완료".to_string(),
        count: items.len(),
    }))
}

/// 종목 라우터.
pub fn stocks_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search_stocks))
        .route("/chart", get(get_chart))
        .route("/master/upload", post(upload_master))
}
