//! # Brief Core
//!
//! 종목 뉴스/토론 요약 서비스의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 다른 모든 크레이트가 공유하는 기본 타입을 담고 있습니다:
//! - 뉴스/종목토론 게시글 모델
//! - 관련도 점수 계산 및 상위 K개 선택
//! - 요약 레코드와 URL 지문
//! - LLM 프롬프트 템플릿
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
