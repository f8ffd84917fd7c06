//! CDC 관련 에러 타입

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdcError {
    /// 재시도해도 해결되지 않는 설정 오류
    #[error("설정 에러: {0}")]
    ConfigurationError(String),

    /// 읽기 권한이 없는 테이블 목록 (전체를 한 번에 보고)
    #[error("사용자 [{}] 에게 테이블 [{}] 의 SELECT 권한이 없습니다: {}", .user, .tables.join(","), .cause)]
    PermissionError {
        user: String,
        tables: Vec<String>,
        cause: String,
    },

    #[error("MySQL 연결 에러: {0}")]
    ConnectionError(String),

    #[error("쿼리 실행 에러: {0}")]
    QueryError(String),

    /// 외부 binlog 클라이언트가 보고한 스트림 장애
    #[error("Binlog 스트림 장애: {0}")]
    StreamFault(String),

    #[error("잘못된 상태 전이: {0}")]
    InvalidState(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("채널이 닫혔습니다")]
    ChannelClosed,
}

impl CdcError {
    /// 재시도 대상이 아닌 에러인지 여부
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CdcError::ConnectionError(_))
    }
}

pub type Result<T> = std::result::Result<T, CdcError>;
