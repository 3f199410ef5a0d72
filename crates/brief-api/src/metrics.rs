//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 수집/요약 메트릭을 기록하고 `/metrics`로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 레코더를 설치하고 렌더링 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러입니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 도메인 메트릭
// ============================================================================

/// 수집된 게시물 수.
pub fn record_crawled_items(kind: &'static str, count: usize) {
    counter!("crawl_items_total", "kind" => kind).increment(count as u64);
}

// ============================================================================
// 경로 정규화
// ============================================================================

fn is_uuid(segment: &str) -> bool {
    segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4
}

fn is_date(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

/// 경로의 동적 세그먼트를 라벨 폭증이 없도록 치환합니다.
///
/// - 6자리 종목코드 → `:code`
/// - `YYYY-MM-DD` → `:date`
/// - UUID, 그 밖의 숫자 → `:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
            if numeric && segment.len() == 6 {
                ":code"
            } else if is_date(segment) {
                ":date"
            } else if is_uuid(segment) || numeric {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
