//! KOSPI 종목 마스터 파일 파서.
//!
//! 한국투자증권이 배포하는 `kospi_code.txt` (CP949 고정폭 텍스트)에서
//! 종목코드와 종목명을 읽습니다.
//!
//! 한 줄의 앞부분 구조:
//! ```text
//! 005930   KR7005930003삼성전자                                ST100...
//! └ 코드 ┘ └ ISIN(12) ┘└──────── 종목명 ─────────┘          └ 그룹코드
//! ```

use std::collections::HashMap;
use std::path::Path;

use brief_core::{is_valid_stock_code, StockInfo};
use encoding_rs::EUC_KR;
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};

/// 유효한 행의 최소 길이 (문자 수).
const MIN_LINE_LEN: usize = 70;
/// ISIN 접두어.
const ISIN_PREFIX: &[char] = &['K', 'R', '7'];
/// ISIN 길이.
const ISIN_LEN: usize = 12;
/// 종목명 다음에 오는 증권그룹 코드.
const GROUP_MARKER: &[char] = &['S', 'T'];

const KOSPI: &str = "KOSPI";

/// CP949 바이트를 디코딩합니다. 잘못된 바이트는 대체 문자로 바뀝니다.
pub fn decode_cp949(bytes: &[u8]) -> String {
    // EUC_KR 디코더는 WHATWG 표준에 따라 CP949 확장 문자를 포함
    let (text, _, had_errors) = EUC_KR.decode(bytes);
    if had_errors {
        warn!("Master file contains invalid CP949 sequences");
    }
    text.into_owned()
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// 한 줄을 파싱합니다. 조건에 맞지 않는 줄은 `None`.
pub fn parse_line(line: &str) -> Option<StockInfo> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() < MIN_LINE_LEN {
        return None;
    }

    let code: String = chars[..6].iter().collect();
    let code = code.trim();
    if !is_valid_stock_code(code) {
        return None;
    }

    let name_start = find_from(&chars, ISIN_PREFIX, 0)? + ISIN_LEN;
    let name_end = find_from(&chars, GROUP_MARKER, name_start)?;
    let name: String = chars[name_start..name_end].iter().collect();
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    Some(StockInfo::new(code, name, KOSPI))
}

/// 종목코드 기준으로 중복을 제거합니다.
///
/// 나중에 나온 항목이 값을 덮어쓰고, 순서는 처음 등장한 위치를 유지합니다.
pub fn dedupe_by_code(items: Vec<StockInfo>) -> Vec<StockInfo> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut result: Vec<StockInfo> = Vec::with_capacity(items.len());

    for item in items {
        match index.get(&item.code) {
            Some(&pos) => result[pos] = item,
            None => {
                index.insert(item.code.clone(), result.len());
                result.push(item);
            }
        }
    }
    result
}

/// 디코딩된 파일 내용을 파싱합니다.
pub fn parse_master(text: &str) -> Vec<StockInfo> {
    let parsed: Vec<StockInfo> = text.lines().filter_map(parse_line).collect();
    let total = parsed.len();
    let items = dedupe_by_code(parsed);
    debug!(parsed = total, unique = items.len(), "Master file parsed");
    items
}

/// 파일을 읽어 종목 목록을 반환합니다.
pub async fn load_master_file<P: AsRef<Path>>(path: P) -> Result<Vec<StockInfo>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        DataError::FileError(format!("{}: {}", path.display(), e))
    })?;

    let items = parse_master(&decode_cp949(&bytes));
    if items.is_empty() {
        return Err(DataError::InvalidData(format!(
            "유효한 종목이 없습니다: {}",
            path.display()
        )));
    }

    info!(path = %path.display(), count = items.len(), "Stock master file loaded");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 고정폭 테스트 행 생성.
    fn line(code: &str, isin: &str, name: &str) -> String {
        format!("{:<9}{}{:<40}ST1000000000000000000000000", code, isin, name)
    }

    #[test]
    fn test_parse_line() {
        let row = line("005930", "KR7005930003", "삼성전자");
        assert!(row.chars().count() >= MIN_LINE_LEN);

        let info = parse_line(&row).unwrap();
        assert_eq!(info, StockInfo::new("005930", "삼성전자", "KOSPI"));
    }

    #[test]
    fn test_rejects_short_and_invalid_lines() {
        assert!(parse_line("005930   KR7005930003삼성전자 ST").is_none());
        assert!(parse_line(&line("A05930", "KR7005930003", "삼성전자")).is_none());
        assert!(parse_line(&line("005930", "KR7005930003", "")).is_none());
        // ISIN 접두어 없음
        assert!(parse_line(&line("005930", "US0000000000", "삼성전자")).is_none());
    }

    #[test]
    fn test_dedupe_last_wins_first_position() {
        let items = vec![
            StockInfo::new("000001", "가", "KOSPI"),
            StockInfo::new("000002", "나", "KOSPI"),
            StockInfo::new("000001", "다", "KOSPI"),
        ];
        let deduped = dedupe_by_code(items);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], StockInfo::new("000001", "다", "KOSPI"));
        assert_eq!(deduped[1].code, "000002");
    }

    #[test]
    fn test_decode_cp949() {
        // "삼성" in CP949
        let bytes = [0xBB, 0xEF, 0xBC, 0xBA];
        assert_eq!(decode_cp949(&bytes), "삼성");
    }

    #[test]
    fn test_parse_master_with_crlf() {
        let text = format!(
            "{}\r\n{}\r\nshort\r\n",
            line("005930", "KR7005930003", "삼성전자"),
            line("000660", "KR7000660001", "SK하이닉스")
        );
        let items = parse_master(&text);

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "SK하이닉스");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_master_file("/nonexistent/kospi_code.txt").await.unwrap_err();
        assert!(matches!(err, DataError::FileError(_)));
    }
}
