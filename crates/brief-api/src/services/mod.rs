//! 요약 관련 서비스.

pub mod summarizer;
pub mod summary;

pub use summarizer::{OpenAiSummarizer, Summarizer, SummarizerError};
pub use summary::SummaryService;
