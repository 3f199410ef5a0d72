//! 요약 생성과 병합.
//!
//! 하루에 하나의 요약 행을 유지합니다. 같은 날 새 게시물이 들어오면 기존 요약문과
//! 새 게시물 제목을 합쳐 다시 요약합니다. 이미 반영된 게시물(URL 지문 기준)은
//! 다시 반영하지 않으므로 같은 묶음을 반복해서 보내도 결과가 바뀌지 않습니다.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use brief_core::{
    relevance_score, select_top, BriefError, BriefResult, DiscussionItem, Fingerprint, NewsItem,
    Scorable, Summary, SummaryKind, SummaryPrompt,
};
use brief_data::{DataError, SummaryStore};
use chrono::NaiveDate;
use metrics::counter;
use tracing::{debug, info, warn, Instrument};

use super::summarizer::Summarizer;

/// 갱신 충돌 시 병합 재시도 횟수.
const MAX_MERGE_ATTEMPTS: usize = 5;

/// 요약 서비스.
#[derive(Clone)]
pub struct SummaryService {
    store: Arc<dyn SummaryStore>,
    summarizer: Arc<dyn Summarizer>,
    top_k: usize,
}

impl SummaryService {
    pub fn new(store: Arc<dyn SummaryStore>, summarizer: Arc<dyn Summarizer>, top_k: usize) -> Self {
        Self {
            store,
            summarizer,
            top_k: top_k.max(1),
        }
    }

    /// 뉴스 목록을 바로 요약합니다 (저장하지 않음).
    pub async fn summarize_news(
        &self,
        stock_name: &str,
        items: &[NewsItem],
        custom_prompt: Option<&str>,
    ) -> BriefResult<String> {
        if items.is_empty() {
            return Err(BriefError::NoContent);
        }
        let prompt = SummaryPrompt::news(stock_name, items, custom_prompt);
        self.call(&prompt).await
    }

    /// 토론 게시글을 관련도 상위 K개로 줄여 요약합니다 (저장하지 않음).
    pub async fn summarize_discussions(
        &self,
        stock_name: &str,
        items: Vec<DiscussionItem>,
        custom_prompt: Option<&str>,
    ) -> BriefResult<String> {
        if items.is_empty() {
            return Err(BriefError::NoContent);
        }
        let prompt = self.discussion_prompt(stock_name, items, custom_prompt);
        self.call(&prompt).await
    }

    /// 뉴스 요약을 저장하거나 기존 요약에 병합합니다.
    pub async fn upsert_news(
        &self,
        stock_code: &str,
        stock_name: &str,
        date: NaiveDate,
        items: Vec<NewsItem>,
    ) -> BriefResult<Summary> {
        let span = brief_core::stock_span!("upsert_summary", stock_code, SummaryKind::News);
        self.upsert(SummaryKind::News, stock_code, stock_name, date, items, |name, items| {
            SummaryPrompt::news(name, &items, None)
        })
        .instrument(span)
        .await
    }

    /// 토론 요약을 저장하거나 기존 요약에 병합합니다.
    pub async fn upsert_discussions(
        &self,
        stock_code: &str,
        stock_name: &str,
        date: NaiveDate,
        items: Vec<DiscussionItem>,
    ) -> BriefResult<Summary> {
        let span = brief_core::stock_span!("upsert_summary", stock_code, SummaryKind::Discussion);
        let top_k = self.top_k;
        self.upsert(
            SummaryKind::Discussion,
            stock_code,
            stock_name,
            date,
            items,
            move |name, items| {
                let ranked = select_top(items, name, top_k);
                SummaryPrompt::discussion(name, ranked.iter().map(|s| &s.item), None)
            },
        )
        .instrument(span)
        .await
    }

    pub async fn get(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        date: NaiveDate,
    ) -> BriefResult<Option<Summary>> {
        Ok(self.store.get(kind, stock_code, date).await?)
    }

    pub async fn list(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BriefResult<Vec<Summary>> {
        if start > end {
            return Err(BriefError::InvalidInput(format!(
                "시작일({})이 종료일({})보다 늦을 수 없습니다",
                start, end
            )));
        }
        Ok(self.store.list_range(kind, stock_code, start, end).await?)
    }

    fn discussion_prompt(
        &self,
        stock_name: &str,
        items: Vec<DiscussionItem>,
        custom_prompt: Option<&str>,
    ) -> SummaryPrompt {
        let ranked = select_top(items, stock_name, self.top_k);
        debug!(selected = ranked.len(), "Discussion items ranked");
        SummaryPrompt::discussion(stock_name, ranked.iter().map(|s| &s.item), custom_prompt)
    }

    async fn call(&self, prompt: &SummaryPrompt) -> BriefResult<String> {
        Ok(self.summarizer.summarize(prompt).await?)
    }

    async fn upsert<T, F>(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        stock_name: &str,
        date: NaiveDate,
        items: Vec<T>,
        initial_prompt: F,
    ) -> BriefResult<Summary>
    where
        T: Fingerprint + Scorable,
        F: FnOnce(&str, Vec<T>) -> SummaryPrompt,
    {
        if items.is_empty() {
            return Err(BriefError::NoContent);
        }

        let existing = self.store.get(kind, stock_code, date).await?;
        let fresh = fresh_items(existing.as_ref(), items);

        if fresh.is_empty() {
            debug!("All items already summarized");
            return existing.ok_or(BriefError::NoContent);
        }

        let pending: Vec<PendingItem> = fresh
            .iter()
            .map(|(fp, item)| PendingItem {
                fingerprint: fp.clone(),
                title: item.title().to_string(),
                score: relevance_score(item, stock_name),
            })
            .collect();

        let row = match existing {
            Some(row) => row,
            None => {
                let fingerprints: Vec<String> =
                    pending.iter().map(|p| p.fingerprint.clone()).collect();
                let items: Vec<T> = fresh.into_iter().map(|(_, item)| item).collect();

                let content = self.call(&initial_prompt(stock_name, items)).await?;
                let summary = Summary::new(kind, stock_code, stock_name, date, content, fingerprints);

                match self.store.insert(&summary).await {
                    Ok(saved) => {
                        counter!("summary_merges_total", "kind" => kind.as_str(), "mode" => "insert")
                            .increment(1);
                        info!(item_count = saved.item_count, "Summary created");
                        return Ok(saved);
                    }
                    // 동시 요청이 먼저 행을 만든 경우 병합으로 처리
                    Err(DataError::DuplicateError(_)) => {
                        warn!("Summary row created concurrently, merging instead");
                        self.reload(kind, stock_code, date).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        self.merge(row, &pending).await
    }

    /// 기존 행에 아직 없는 게시물을 합칩니다.
    ///
    /// 읽은 뒤 다른 요청이 먼저 갱신했으면 행을 다시 읽어 남은 게시물로
    /// 병합을 다시 시도합니다.
    async fn merge(&self, mut row: Summary, pending: &[PendingItem]) -> BriefResult<Summary> {
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let remaining: Vec<&PendingItem> = pending
                .iter()
                .filter(|p| !row.contains_fingerprint(&p.fingerprint))
                .collect();
            if remaining.is_empty() {
                debug!("All items already summarized");
                return Ok(row);
            }

            let prompt = SummaryPrompt::merge(
                row.kind,
                &row.summary_content,
                self.merge_titles(row.kind, &remaining),
            );
            let content = self.call(&prompt).await?;

            let expected = row.updated_at;
            let previous = row.item_count;
            let mut merged = row.clone();
            merged.apply_merge(
                content,
                remaining.iter().map(|p| p.fingerprint.clone()).collect(),
            );

            match self.store.update(&merged, expected).await {
                Ok(updated) => {
                    counter!("summary_merges_total", "kind" => updated.kind.as_str(), "mode" => "merge")
                        .increment(1);
                    info!(
                        previous,
                        item_count = updated.item_count,
                        attempt,
                        "Summary merged"
                    );
                    return Ok(updated);
                }
                Err(DataError::Conflict(_)) => {
                    counter!("summary_merge_conflicts_total", "kind" => row.kind.as_str())
                        .increment(1);
                    warn!(attempt, "Summary changed during merge, retrying");
                    let stock_code = row.stock_code.clone();
                    row = self.reload(row.kind, &stock_code, row.summary_date).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BriefError::Database(format!(
            "요약 병합 충돌이 {}회 반복되었습니다",
            MAX_MERGE_ATTEMPTS
        )))
    }

    /// 병합 지시문에 넣을 제목.
    ///
    /// 토론은 점수 상위 `top_k`개만 넣습니다. 지문은 모두 반영됩니다.
    fn merge_titles<'a>(&self, kind: SummaryKind, remaining: &[&'a PendingItem]) -> Vec<&'a str> {
        match kind {
            SummaryKind::News => remaining.iter().copied().map(|p| p.title.as_str()).collect(),
            SummaryKind::Discussion => {
                let mut ranked = remaining.to_vec();
                // sort_by는 안정 정렬
                ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
                ranked
                    .into_iter()
                    .take(self.top_k)
                    .map(|p| p.title.as_str())
                    .collect()
            }
        }
    }

    async fn reload(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        date: NaiveDate,
    ) -> BriefResult<Summary> {
        self.store
            .get(kind, stock_code, date)
            .await?
            .ok_or_else(|| BriefError::Database("병합할 요약 행이 없습니다".to_string()))
    }
}

/// 병합을 기다리는 게시물.
struct PendingItem {
    fingerprint: String,
    title: String,
    score: f64,
}

/// 아직 반영되지 않은 게시물과 지문. 묶음 안의 중복도 제거합니다.
fn fresh_items<T: Fingerprint>(existing: Option<&Summary>, items: Vec<T>) -> Vec<(String, T)> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| {
            let fp = item.fingerprint();
            let known = existing.is_some_and(|row| row.contains_fingerprint(&fp));
            (!known && seen.insert(fp.clone())).then_some((fp, item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::summarizer::SummarizerError;
    use async_trait::async_trait;
    use brief_data::InMemorySummaryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// 호출을 기록하는 요약기.
    #[derive(Default)]
    struct RecordingSummarizer {
        calls: AtomicUsize,
        prompts: Mutex<Vec<SummaryPrompt>>,
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(&self, prompt: &SummaryPrompt) -> Result<String, SummarizerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.prompts.lock().await.push(prompt.clone());
            Ok(format!("요약 #{}", n))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn news(n: u32) -> NewsItem {
        NewsItem {
            title: format!("삼성전자 뉴스 {}", n),
            content: "본문".to_string(),
            url: format!("https://finance.naver.com/item/news_read.naver?article_id={}", n),
            date: "2024.03.15 09:00".to_string(),
            source: "연합뉴스".to_string(),
        }
    }

    fn discussion(n: u32, views: u64) -> DiscussionItem {
        DiscussionItem {
            title: format!("토론 {}", n),
            content: String::new(),
            url: format!("https://finance.naver.com/item/board_read.naver?nid={}", n),
            date: "2024.03.15 10:00".to_string(),
            author: "개미".to_string(),
            views,
            likes: 0,
        }
    }

    fn service() -> (SummaryService, Arc<RecordingSummarizer>, Arc<InMemorySummaryStore>) {
        let store = Arc::new(InMemorySummaryStore::new());
        let summarizer = Arc::new(RecordingSummarizer::default());
        let service = SummaryService::new(store.clone(), summarizer.clone(), 10);
        (service, summarizer, store)
    }

    #[tokio::test]
    async fn test_empty_items_rejected_without_call() {
        let (service, summarizer, _) = service();

        let err = service
            .upsert_news("005930", "삼성전자", date(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, BriefError::NoContent));

        let err = service.summarize_news("삼성전자", &[], None).await.unwrap_err();
        assert!(matches!(err, BriefError::NoContent));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_upsert_inserts() {
        let (service, summarizer, store) = service();

        let saved = service
            .upsert_news("005930", "삼성전자", date(), vec![news(1), news(2)])
            .await
            .unwrap();

        assert_eq!(saved.item_count, 2);
        assert_eq!(saved.summary_content, "요약 #1");
        assert_eq!(store.len().await, 1);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);

        let prompts = summarizer.prompts.lock().await;
        assert!(prompts[0].user.contains("- 삼성전자 뉴스 1"));
    }

    #[tokio::test]
    async fn test_second_upsert_merges_new_titles_only() {
        let (service, summarizer, _) = service();

        service
            .upsert_news("005930", "삼성전자", date(), vec![news(1), news(2)])
            .await
            .unwrap();
        let merged = service
            .upsert_news("005930", "삼성전자", date(), vec![news(2), news(3), news(4)])
            .await
            .unwrap();

        // news(2)는 이미 반영됨
        assert_eq!(merged.item_count, 4);
        assert_eq!(merged.summary_content, "요약 #2");

        let prompts = summarizer.prompts.lock().await;
        let merge_prompt = &prompts[1].user;
        assert!(merge_prompt.contains("기존 요약:\n요약 #1"));
        assert!(merge_prompt.contains("- 삼성전자 뉴스 3"));
        assert!(merge_prompt.contains("- 삼성전자 뉴스 4"));
        assert!(!merge_prompt.contains("- 삼성전자 뉴스 2"));
    }

    #[tokio::test]
    async fn test_repeated_batch_is_idempotent() {
        let (service, summarizer, _) = service();
        let batch = vec![news(1), news(2)];

        let first = service
            .upsert_news("005930", "삼성전자", date(), batch.clone())
            .await
            .unwrap();
        let second = service
            .upsert_news("005930", "삼성전자", date(), batch)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicates_within_batch_counted_once() {
        let (service, _, _) = service();

        let saved = service
            .upsert_news("005930", "삼성전자", date(), vec![news(1), news(1), news(2)])
            .await
            .unwrap();
        assert_eq!(saved.item_count, 2);
    }

    #[tokio::test]
    async fn test_kinds_are_separate_rows() {
        let (service, _, store) = service();

        service
            .upsert_news("005930", "삼성전자", date(), vec![news(1)])
            .await
            .unwrap();
        let row = service
            .upsert_discussions("005930", "삼성전자", date(), vec![discussion(1, 10)])
            .await
            .unwrap();

        assert_eq!(row.kind, SummaryKind::Discussion);
        assert_eq!(row.item_count, 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_discussion_prompt_uses_top_k_but_counts_all() {
        let store = Arc::new(InMemorySummaryStore::new());
        let summarizer = Arc::new(RecordingSummarizer::default());
        let service = SummaryService::new(store, summarizer.clone(), 2);

        let items = vec![discussion(1, 0), discussion(2, 900), discussion(3, 300)];
        let saved = service
            .upsert_discussions("005930", "삼성전자", date(), items)
            .await
            .unwrap();
        assert_eq!(saved.item_count, 3);

        let prompts = summarizer.prompts.lock().await;
        let user = &prompts[0].user;
        assert!(user.contains("토론 2"));
        assert!(user.contains("토론 3"));
        assert!(!user.contains("- 토론 1 "));
        // 조회수가 높은 글이 먼저
        assert!(user.find("토론 2").unwrap() < user.find("토론 3").unwrap());
    }

    #[tokio::test]
    async fn test_discussion_merge_titles_capped_at_top_k() {
        let store = Arc::new(InMemorySummaryStore::new());
        let summarizer = Arc::new(RecordingSummarizer::default());
        let service = SummaryService::new(store, summarizer.clone(), 2);

        service
            .upsert_discussions("005930", "삼성전자", date(), vec![discussion(1, 50)])
            .await
            .unwrap();
        let fresh = vec![
            discussion(2, 100),
            discussion(3, 2000),
            discussion(4, 0),
            discussion(5, 400),
        ];
        let merged = service
            .upsert_discussions("005930", "삼성전자", date(), fresh)
            .await
            .unwrap();

        // 제목은 상위 2개만, 지문과 건수는 전부 반영
        assert_eq!(merged.item_count, 5);
        assert_eq!(merged.fingerprints.len(), 5);

        let prompts = summarizer.prompts.lock().await;
        let user = &prompts[1].user;
        let titles: Vec<&str> = user.lines().filter(|l| l.starts_with("- ")).collect();
        assert_eq!(titles, vec!["- 토론 3", "- 토론 5"]);
    }

    /// 응답 전에 잠시 멈추는 요약기.
    #[derive(Default)]
    struct SlowSummarizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for SlowSummarizer {
        async fn summarize(&self, _prompt: &SummaryPrompt) -> Result<String, SummarizerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok(format!("요약 #{}", n))
        }
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_every_item() {
        let store = Arc::new(InMemorySummaryStore::new());
        let summarizer = Arc::new(SlowSummarizer::default());
        let service = SummaryService::new(store.clone(), summarizer.clone(), 10);

        service
            .upsert_news("005930", "삼성전자", date(), vec![news(1), news(2)])
            .await
            .unwrap();

        // 두 요청이 같은 행을 읽고 요약기를 기다리는 동안 겹침
        let (a, b) = tokio::join!(
            service.upsert_news("005930", "삼성전자", date(), vec![news(3), news(4), news(5)]),
            service.upsert_news("005930", "삼성전자", date(), vec![news(6)]),
        );
        a.unwrap();
        b.unwrap();

        let row = store
            .get(SummaryKind::News, "005930", date())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.item_count, 6);
        assert_eq!(row.fingerprints.len(), 6);
        for n in 1..=6 {
            assert!(row.contains_fingerprint(&news(n).fingerprint()), "news {}", n);
        }
        // 첫 저장 1회, 병합 2회, 충돌 후 재병합 1회
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_summarize_discussions_custom_prompt() {
        let (service, summarizer, _) = service();

        service
            .summarize_discussions("삼성전자", vec![discussion(1, 5)], Some("한 줄로 요약"))
            .await
            .unwrap();

        let prompts = summarizer.prompts.lock().await;
        assert_eq!(prompts[0].user, "한 줄로 요약");
    }

    #[tokio::test]
    async fn test_list_requires_ordered_range() {
        let (service, _, _) = service();
        let later = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();

        assert!(matches!(
            service.list(SummaryKind::News, "005930", later, date()).await,
            Err(BriefError::InvalidInput(_))
        ));
        assert!(service
            .list(SummaryKind::News, "005930", date(), later)
            .await
            .unwrap()
            .is_empty());
    }
}
