//! 요약 요청 프롬프트 템플릿.

use super::{DiscussionItem, NewsItem, SummaryKind};

/// 뉴스 요약용 시스템 지시문.
pub const NEWS_SYSTEM_PROMPT: &str =
    "당신은 주식 시장 전문가입니다. 주어진 뉴스를 종합적으로 분석하고 투자자에게 도움이 되는 인사이트를 제공해주세요.";

/// 종목토론 요약용 시스템 지시문.
pub const DISCUSSION_SYSTEM_PROMPT: &str =
    "당신은 주식 시장 전문가입니다. 주어진 종목토론방 게시글들을 종합적으로 분석하고 투자자에게 도움이 되는 인사이트를 제공해주세요.";

/// 요약 모델에 보낼 프롬프트 한 쌍.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPrompt {
    /// 시스템 지시문
    pub system: &'static str,
    /// 사용자 메시지
    pub user: String,
}

impl SummaryPrompt {
    /// 뉴스 요약 프롬프트. `custom`이 있으면 템플릿 대신 사용합니다.
    pub fn news(stock_name: &str, items: &[NewsItem], custom: Option<&str>) -> Self {
        Self {
            system: system_prompt(SummaryKind::News),
            user: custom_or(custom, || build_news_prompt(stock_name, items)),
        }
    }

    /// 종목토론 요약 프롬프트. `items`는 이미 순위대로 정렬되어 있어야 합니다.
    pub fn discussion<'a, I>(stock_name: &str, items: I, custom: Option<&str>) -> Self
    where
        I: IntoIterator<Item = &'a DiscussionItem>,
    {
        Self {
            system: system_prompt(SummaryKind::Discussion),
            user: custom_or(custom, || build_discussion_prompt(stock_name, items)),
        }
    }

    /// 기존 요약에 새 게시물 제목을 합치는 프롬프트.
    pub fn merge<'a, I>(kind: SummaryKind, existing: &str, new_titles: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            system: system_prompt(kind),
            user: build_merge_prompt(kind, existing, new_titles),
        }
    }
}

/// 구분별 시스템 지시문.
pub fn system_prompt(kind: SummaryKind) -> &'static str {
    match kind {
        SummaryKind::News => NEWS_SYSTEM_PROMPT,
        SummaryKind::Discussion => DISCUSSION_SYSTEM_PROMPT,
    }
}

fn custom_or(custom: Option<&str>, build: impl FnOnce() -> String) -> String {
    match custom.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => build(),
    }
}

/// 뉴스 요약 템플릿.
pub fn build_news_prompt(stock_name: &str, items: &[NewsItem]) -> String {
    let list = items
        .iter()
        .map(|item| format!("- {}", item.title))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "다음은 {name}에 대한 최근 뉴스들입니다. 이 뉴스들을 종합적으로 분석하여 다음 형식으로 요약해주세요:

1. 시장 동향
- 전체적인 시장 상황과 주요 이슈
- {name}의 시장 내 위치와 영향력

2. 핵심 뉴스 분석
- 가장 중요한 뉴스와 그 의미
- 전체적인 맥락에서의 해석

3. 투자 시사점
- 단기적 관점
- 중장기적 관점
- 주의해야 할 리스크 요인

뉴스 목록:
{list}
",
        name = stock_name,
        list = list
    )
}

/// 종목토론 요약 템플릿.
pub fn build_discussion_prompt<'a, I>(stock_name: &str, items: I) -> String
where
    I: IntoIterator<Item = &'a DiscussionItem>,
{
    let list = items
        .into_iter()
        .map(|item| {
            format!(
                "- {} (조회수: {}, 좋아요: {})",
                item.title, item.views, item.likes
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "다음은 {name}에 대한 최근 종목토론방 게시글들입니다. 이 게시글들을 종합적으로 분석하여 다음 형식으로 요약해주세요:

1. 투자자 심리 분석
- 전체적인 투자자들의 심리 상태
- 주요 관심사와 우려사항

2. 핵심 논의 사항
- 가장 많이 논의되는 주제
- 긍정적/부정적 의견 분석

3. 투자 시사점
- 단기적 관점
- 중장기적 관점
- 주의해야 할 리스크 요인

각 섹션은 명확하게 구분되어야 하며, 마크다운 문법이나 특수 기호를 사용하지 말고 일반 텍스트로 작성해주세요.
각 항목은 들여쓰기와 줄바꿈을 사용하여 가독성을 높여주세요.

게시글 목록:
{list}
",
        name = stock_name,
        list = list
    )
}

/// 병합 템플릿. 기존 게시물 원문은 보관하지 않으므로 새 게시물 제목만 나열합니다.
pub fn build_merge_prompt<'a, I>(kind: SummaryKind, existing: &str, new_titles: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let list = new_titles
        .into_iter()
        .map(|title| format!("- {}", title))
        .collect::<Vec<_>>()
        .join("\n");
    let label = kind.item_label();
    let object = match kind {
        SummaryKind::News => "뉴스를",
        SummaryKind::Discussion => "게시글을",
    };

    format!(
        "기존 요약:
{existing}

새로운 {label}:
{list}

위의 기존 요약과 새로운 {object} 종합적으로 분석하여 하나의 요약으로 만들어주세요.
",
        existing = existing,
        label = label,
        object = object,
        list = list
    )
}
