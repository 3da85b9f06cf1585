use std::path::PathBuf;

use crate::config::ConfigError;

/// 애플리케이션 전역 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 로그 디렉토리나 파일을 열 수 없음 (해당 소스만 건너뜀)
    #[error("failed to read {}: {source}", path.display())]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 알림 전송 실패 (재시도하지 않음)
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// 에러 코드 반환
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::UnreadableSource { .. } => "SOURCE500",
            AppError::Delivery(_) => "DELIVERY502",
            AppError::Config(_) => "CONFIG500",
        }
    }

    /// 소스 단위로 건너뛸 수 있는 에러인지 여부
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::UnreadableSource { .. } | AppError::Delivery(_)
        )
    }
}

/// 편의 함수들
impl AppError {
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::UnreadableSource {
            path: path.into(),
            source,
        }
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        AppError::Delivery(msg.into())
    }
}
