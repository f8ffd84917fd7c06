//! Binlog 처리 위치 추적 (Position 및 CheckpointState)
//!
//! Binlog 파일명 + 위치로 정확한 재시작 지점을 추적합니다.
//! 예: "mysql-bin.000003" 파일의 4097 바이트 위치

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binlog 좌표
///
/// `journal_name` 이 비어 있으면 파일이 지정되지 않은 것이며, 이 경우
/// `timestamp` 만으로 외부 클라이언트가 서버 측에서 위치를 찾습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// 바이너리 로그 파일명 (e.g., "mysql-bin.000001")
    #[serde(default)]
    pub journal_name: String,
    /// 파일 내 바이트 위치
    #[serde(default)]
    pub position: u64,
    /// 이벤트 타임스탬프 (epoch millis)
    #[serde(default)]
    pub timestamp: i64,
}

impl Position {
    pub fn new(journal_name: impl Into<String>, position: u64) -> Self {
        Position {
            journal_name: journal_name.into(),
            position,
            timestamp: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_journal(&self) -> bool {
        !self.journal_name.is_empty()
    }

    /// 파일명에서 시퀀스 번호 추출
    pub fn file_sequence(&self) -> Option<u64> {
        self.journal_name
            .rsplit('.')
            .next()
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.journal_name, self.position)
    }
}

/// 외부 엔진이 영속화하는 체크포인트
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointState {
    pub position: Option<Position>,
}

impl CheckpointState {
    pub fn new(position: Option<Position>) -> Self {
        CheckpointState { position }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
