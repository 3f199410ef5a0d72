//! Stock Brief API 서버.
//!
//! 설정을 로드하고 선택적 의존성(PostgreSQL, KIS, LLM)을 연결한 뒤 Axum 서버를
//! 시작합니다. 빠진 의존성은 해당 기능만 비활성화합니다.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, routing::get, Router};
use brief_core::{init_logging, AppConfig, CorsConfig, LogConfig};
use brief_data::{Database, PgSummaryStore};
use brief_exchange::{KisChartClient, KisConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use brief_api::metrics::setup_metrics_recorder;
use brief_api::middleware::{
    metrics_layer, rate_limit_middleware, RateLimitConfig, RateLimitState,
};
use brief_api::openapi::swagger_ui_router;
use brief_api::repository::PgUserStore;
use brief_api::routes::create_api_router;
use brief_api::services::OpenAiSummarizer;
use brief_api::state::AppState;

/// Rate Limit 추적 IP 정리 주기.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// 설정에 따라 선택적 의존성을 붙인 상태를 만듭니다.
async fn create_app_state(config: AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let database = if config.database.url.is_some() {
        match Database::connect(&config.database).await {
            Ok(db) => {
                if config.database.run_migrations {
                    db.migrate().await?;
                }
                Some(db)
            }
            Err(e) => {
                warn!(error = %e, "Database unavailable, using in-memory stores");
                None
            }
        }
    } else {
        warn!("DATABASE_URL not set, using in-memory stores");
        None
    };

    let kis_client = match KisConfig::from_settings(&config.kis) {
        Some(kis_config) => Some(KisChartClient::new(kis_config)?),
        None => {
            warn!("KIS credentials not set, chart API disabled");
            None
        }
    };

    let summarizer = OpenAiSummarizer::from_config(&config.summarizer)?;
    if summarizer.is_none() {
        warn!("OPENAI_API_KEY not set, summarize API disabled");
    }

    let mut state = AppState::new(config)?;

    if let Some(db) = database {
        let pool = db.pool().clone();
        state = state
            .with_summary_store(Arc::new(PgSummaryStore::new(pool.clone())))
            .with_user_store(Arc::new(PgUserStore::new(pool.clone())))
            .with_db_pool(pool);
        info!("PostgreSQL stores enabled");
    }
    if let Some(client) = kis_client {
        state = state.with_kis_client(client);
        info!("KIS chart client enabled");
    }
    if let Some(summarizer) = summarizer {
        info!(?summarizer, "Summarizer enabled");
        state = state.with_summarizer(Arc::new(summarizer));
    }

    Ok(state)
}

/// CORS 레이어 설정.
///
/// 허용 origin이 비어 있으면 모든 origin을 허용합니다 (개발 모드).
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !origins.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    } else {
        warn!("CORS origins not set, allowing any origin (development mode)");
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    rate_limit_state: Option<RateLimitState>,
) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.cors);

    // 메트릭 라우터 (별도 상태, Rate Limit 제외)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let api_router = match rate_limit_state {
        Some(rate_limit_state) => create_api_router()
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                rate_limit_state,
                rate_limit_middleware,
            )),
        None => {
            info!("Rate limiting DISABLED");
            create_api_router().with_state(state)
        }
    };

    Router::new()
        .merge(metrics_router)
        .merge(api_router)
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors)
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 `true`를 반환합니다.
fn handle_export_openapi() -> Result<bool, serde_json::Error> {
    use brief_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        println!("{}", serde_json::to_string_pretty(&ApiDoc::openapi())?);
        return Ok(true);
    }
    Ok(false)
}

/// 오래된 Rate Limit 항목을 주기적으로 정리합니다.
fn spawn_rate_limit_cleanup(state: RateLimitState, shutdown_token: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => break,
                _ = interval.tick() => state.limiter().cleanup().await,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    if handle_export_openapi()? {
        return Ok(());
    }

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    info!("Starting Stock Brief API server...");

    let metrics_handle = setup_metrics_recorder()?;

    let addr: std::net::SocketAddr = config.server.bind_address().parse()?;
    let rate_limit = config.rate_limit.clone();

    let state = Arc::new(create_app_state(config).await?);

    let shutdown_token = CancellationToken::new();

    let rate_limit_state = if rate_limit.disabled {
        None
    } else {
        info!(
            requests_per_minute = rate_limit.requests_per_minute,
            "Rate limiting configured"
        );
        let rate_limit_state =
            RateLimitState::new(RateLimitConfig::new(rate_limit.requests_per_minute));
        spawn_rate_limit_cleanup(rate_limit_state.clone(), shutdown_token.clone());
        Some(rate_limit_state)
    };

    let app = create_router(state, metrics_handle, rate_limit_state);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    shutdown_token.cancel();
    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM을 받으면 종료 토큰을 취소합니다. 시그널 핸들러 설치에
/// 실패하면 해당 시그널은 기다리지 않습니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
