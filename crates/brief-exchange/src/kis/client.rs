//! KIS 국내 주식 차트 클라이언트.
//!
//! # 지원 기능
//!
//! - 일별 시세 조회 (기본: 최근 90일)
//! - 당일 분봉 조회 (1, 3, 5, 10, 15, 30, 60분)

use std::sync::Arc;

use brief_core::is_valid_stock_code;
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Asia::Seoul;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::auth::TokenCache;
use super::config::KisConfig;
use super::tr_id;
use crate::ExchangeError;

/// 허용되는 분봉 단위.
pub const MINUTE_TIME_FRAMES: [u32; 7] = [1, 3, 5, 10, 15, 30, 60];
/// 기본 분봉 단위.
pub const DEFAULT_TIME_FRAME: u32 = 30;
/// 분봉 최대/기본 요청 건수.
pub const MAX_MINUTE_COUNT: u32 = 100;
/// 일봉 기본 조회 기간 (일).
pub const DEFAULT_DAILY_DAYS: i64 = 90;

const KIS_DATE_FORMAT: &str = "%Y%m%d";

/// 차트 조회 조건.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartQuery {
    /// 일봉 (시작일, 종료일)
    Daily { start: NaiveDate, end: NaiveDate },
    /// 분봉 (단위, 건수)
    Minute { time_frame: u32, count: u32 },
}

impl ChartQuery {
    /// 기본 기간의 일봉 조회.
    pub fn daily_default() -> Self {
        let (start, end) = KisChartClient::default_daily_window();
        ChartQuery::Daily { start, end }
    }

    /// 분봉 조회 조건 생성. 값이 없으면 기본값을 사용합니다.
    pub fn minute(time_frame: Option<u32>, count: Option<u32>) -> Result<Self, ExchangeError> {
        let (time_frame, count) = validate_minute(
            time_frame.unwrap_or(DEFAULT_TIME_FRAME),
            count.unwrap_or(MAX_MINUTE_COUNT),
        )?;
        Ok(ChartQuery::Minute { time_frame, count })
    }
}

fn validate_minute(time_frame: u32, count: u32) -> Result<(u32, u32), ExchangeError> {
    if !MINUTE_TIME_FRAMES.contains(&time_frame) {
        return Err(ExchangeError::InvalidRequest(format!(
            "지원하지 않는 분봉 단위입니다: {} (허용: {:?})",
            time_frame, MINUTE_TIME_FRAMES
        )));
    }
    if count == 0 || count > MAX_MINUTE_COUNT {
        return Err(ExchangeError::InvalidRequest(format!(
            "요청 건수는 1~{} 사이여야 합니다: {}",
            MAX_MINUTE_COUNT, count
        )));
    }
    Ok((time_frame, count))
}

/// 국내 주식 일봉 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCandle {
    /// 영업일자 (YYYYMMDD)
    #[serde(rename(deserialize = "stck_bsop_date"))]
    pub date: String,
    /// 시가
    #[serde(rename(deserialize = "stck_oprc"), deserialize_with = "deserialize_decimal")]
    pub open: Decimal,
    /// 고가
    #[serde(rename(deserialize = "stck_hgpr"), deserialize_with = "deserialize_decimal")]
    pub high: Decimal,
    /// 저가
    #[serde(rename(deserialize = "stck_lwpr"), deserialize_with = "deserialize_decimal")]
    pub low: Decimal,
    /// 종가
    #[serde(rename(deserialize = "stck_clpr"), deserialize_with = "deserialize_decimal")]
    pub close: Decimal,
    /// 거래량
    #[serde(rename(deserialize = "acml_vol"), deserialize_with = "deserialize_decimal")]
    pub volume: Decimal,
    /// 거래대금 (응답에서 누락될 수 있음)
    #[serde(
        rename(serialize = "tradingValue", deserialize = "acml_tr_pbmn"),
        default,
        deserialize_with = "deserialize_decimal"
    )]
    pub trading_value: Decimal,
    /// 전일 대비
    #[serde(rename(deserialize = "prdy_vrss"), default, deserialize_with = "deserialize_decimal")]
    pub change: Decimal,
    /// 등락률 (%)
    #[serde(
        rename(serialize = "changeRate", deserialize = "prdy_ctrt"),
        default,
        deserialize_with = "deserialize_decimal"
    )]
    pub change_rate: Decimal,
}

/// 국내 주식 분봉 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteCandle {
    /// 영업일자 (YYYYMMDD)
    #[serde(rename(deserialize = "stck_bsop_date"), default)]
    pub date: String,
    /// 체결 시간 (HHMMSS)
    #[serde(rename(deserialize = "stck_cntg_hour"))]
    pub time: String,
    /// 시가
    #[serde(rename(deserialize = "stck_oprc"), deserialize_with = "deserialize_decimal")]
    pub open: Decimal,
    /// 고가
    #[serde(rename(deserialize = "stck_hgpr"), deserialize_with = "deserialize_decimal")]
    pub high: Decimal,
    /// 저가
    #[serde(rename(deserialize = "stck_lwpr"), deserialize_with = "deserialize_decimal")]
    pub low: Decimal,
    /// 현재가 (종가)
    #[serde(rename(deserialize = "stck_prpr"), deserialize_with = "deserialize_decimal")]
    pub close: Decimal,
    /// 체결 거래량
    #[serde(rename(deserialize = "cntg_vol"), deserialize_with = "deserialize_decimal")]
    pub volume: Decimal,
}

/// 차트 조회 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "candles", rename_all = "lowercase")]
pub enum ChartData {
    Daily(Vec<DailyCandle>),
    Minute(Vec<MinuteCandle>),
}

impl ChartData {
    /// 봉 개수.
    pub fn len(&self) -> usize {
        match self {
            ChartData::Daily(c) => c.len(),
            ChartData::Minute(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// KIS 국내 주식 차트 클라이언트.
///
/// [`TokenCache`]를 `Arc`로 공유하므로 복제해도 토큰은 한 번만 발급됩니다.
#[derive(Clone)]
pub struct KisChartClient {
    tokens: Arc<TokenCache>,
    client: Client,
}

impl KisChartClient {
    /// 새 클라이언트 생성.
    pub fn new(config: KisConfig) -> Result<Self, ExchangeError> {
        Self::with_token_cache(Arc::new(TokenCache::new(config)?))
    }

    /// 공유된 토큰 캐시로 클라이언트 생성.
    pub fn with_token_cache(tokens: Arc<TokenCache>) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(tokens.config().timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self { tokens, client })
    }

    /// 토큰 캐시 참조.
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// 기본 일봉 조회 기간 (한국 시간 기준 최근 90일).
    pub fn default_daily_window() -> (NaiveDate, NaiveDate) {
        let end = Utc::now().with_timezone(&Seoul).date_naive();
        (end - Duration::days(DEFAULT_DAILY_DAYS), end)
    }

    /// 조회 조건에 따라 차트를 가져옵니다.
    pub async fn chart(&self, code: &str, query: ChartQuery) -> Result<ChartData, ExchangeError> {
        match query {
            ChartQuery::Daily { start, end } => {
                self.daily_chart(code, start, end).await.map(ChartData::Daily)
            }
            ChartQuery::Minute { time_frame, count } => self
                .minute_chart(code, time_frame, count)
                .await
                .map(ChartData::Minute),
        }
    }

    /// 주식 일별 시세 조회.
    ///
    /// # 인자
    /// * `code` - 종목코드 (예: "005930" 삼성전자)
    /// * `start` / `end` - 조회 기간 (포함)
    #[instrument(skip(self))]
    pub async fn daily_chart(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyCandle>, ExchangeError> {
        validate_code(code)?;
        if start > end {
            return Err(ExchangeError::InvalidRequest(format!(
                "시작일({})이 종료일({})보다 늦을 수 없습니다",
                start, end
            )));
        }

        let start_str = start.format(KIS_DATE_FORMAT).to_string();
        let end_str = end.format(KIS_DATE_FORMAT).to_string();

        let body = self
            .get(
                "/uapi/domestic-stock/v1/quotations/inquire-daily-price",
                tr_id::KR_DAILY_PRICE,
                &[
                    ("FID_COND_MRKT_DIV_CODE", "J"), // J=주식
                    ("FID_INPUT_ISCD", code),
                    ("FID_PERIOD_DIV_CODE", "D"),
                    ("FID_ORG_ADJ_PRC", "1"), // 1=수정주가 반영
                    ("FID_INPUT_DATE_1", &start_str),
                    ("FID_INPUT_DATE_2", &end_str),
                ],
            )
            .await?;

        let resp: DailyPriceResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::ParseError(format!("Failed to parse daily price response: {}", e))
        })?;
        check_rt_cd(&resp.rt_cd, &resp.msg_cd, &resp.msg1)?;

        // YYYYMMDD 문자열은 사전순 비교가 날짜 비교와 같음
        let candles: Vec<DailyCandle> = resp
            .output
            .into_iter()
            .filter(|c| c.date.is_empty() || (c.date >= start_str && c.date <= end_str))
            .collect();

        debug!(stock_code = code, count = candles.len(), "Daily chart fetched");
        Ok(candles)
    }

    /// 주식 분봉 조회.
    ///
    /// # 인자
    /// * `code` - 종목코드
    /// * `time_frame` - 분 단위 (1, 3, 5, 10, 15, 30, 60)
    /// * `count` - 요청 건수 (1~100)
    #[instrument(skip(self))]
    pub async fn minute_chart(
        &self,
        code: &str,
        time_frame: u32,
        count: u32,
    ) -> Result<Vec<MinuteCandle>, ExchangeError> {
        validate_code(code)?;
        let (time_frame, count) = validate_minute(time_frame, count)?;

        let time_frame_str = time_frame.to_string();
        let count_str = count.to_string();

        let body = self
            .get(
                "/uapi/domestic-stock/v1/quotations/inquire-time-itemchartprice",
                tr_id::KR_MINUTE_CHART,
                &[
                    ("FID_ETC_CLS_CODE", &time_frame_str),
                    ("FID_COND_MRKT_DIV_CODE", "J"),
                    ("FID_INPUT_ISCD", code),
                    ("FID_PW_DATA_INCU_YN", "N"),
                    ("FID_INPUT_DATE_1", ""),
                    ("FID_INPUT_HOUR_1", ""),
                    ("FID_REQ_CNT", &count_str),
                ],
            )
            .await?;

        let resp: MinuteChartResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::ParseError(format!("Failed to parse minute chart response: {}", e))
        })?;
        check_rt_cd(&resp.rt_cd, &resp.msg_cd, &resp.msg1)?;

        let mut candles = resp.output2;
        candles.truncate(count as usize);

        debug!(stock_code = code, count = candles.len(), "Minute chart fetched");
        Ok(candles)
    }

    /// 인증 헤더를 붙여 GET 요청을 보내고 본문을 반환합니다.
    async fn get(
        &self,
        path: &str,
        tr_id: &str,
        query: &[(&str, &str)],
    ) -> Result<String, ExchangeError> {
        let url = format!("{}{}", self.tokens.config().rest_base_url(), path);
        let headers = self.tokens.build_headers(tr_id).await?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // 서버 측에서 토큰이 폐기된 경우 다음 요청에서 재발급
            self.tokens.invalidate().await;
            return Err(ExchangeError::Unauthorized(body));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited);
        }
        if !status.is_success() {
            error!("KIS request failed: {} {} - {}", path, status, body);
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        Ok(body)
    }
}

fn validate_code(code: &str) -> Result<(), ExchangeError> {
    if !is_valid_stock_code(code) {
        return Err(ExchangeError::InvalidRequest(format!(
            "종목코드는 6자리 숫자여야 합니다: {}",
            code
        )));
    }
    Ok(())
}

fn check_rt_cd(rt_cd: &str, msg_cd: &str, msg1: &str) -> Result<(), ExchangeError> {
    if rt_cd != "0" {
        return Err(ExchangeError::ApiError {
            code: msg_cd.trim_start_matches(|c: char| c.is_ascii_alphabetic()).parse().unwrap_or(-1),
            message: format!("{} ({})", msg1.trim(), msg_cd),
        });
    }
    Ok(())
}

// ========================================
// API 응답 래퍼
// ========================================

#[derive(Debug, Deserialize)]
struct DailyPriceResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    #[serde(default)]
    output: Vec<DailyCandle>,
}

#[derive(Debug, Deserialize)]
struct MinuteChartResponse {
    rt_cd: String,
    #[serde(default)]
    msg_cd: String,
    #[serde(default)]
    msg1: String,
    #[serde(default)]
    output2: Vec<MinuteCandle>,
}

/// 문자열을 Decimal로 역직렬화.
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return Ok(Decimal::ZERO);
    }
    s.parse::<Decimal>()
        .map_err(|_| serde::de::Error::custom(format!("Invalid decimal: {}", s)))
}
