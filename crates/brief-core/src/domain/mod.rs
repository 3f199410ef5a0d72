//! 뉴스/종목토론 요약을 위한 도메인 모델.

mod item;
mod page_range;
mod prompt;
mod scoring;
mod summary;

pub use item::*;
pub use page_range::*;
pub use prompt::*;
pub use scoring::*;
pub use summary::*;
