//! 재시작 위치 결정
//!
//! 우선순위: 체크포인트 > 사용자 지정 시작 좌표 > 서버 현재 위치(None)

use crate::config::StartConfig;
use crate::error::{CdcError, Result};
use crate::offset::Position;
use async_trait::async_trait;
use tracing::info;

/// binlog 파일이 서버에 남아 있는지 확인
#[async_trait]
pub trait JournalValidator: Send + Sync {
    async fn exists(&self, journal_name: &str) -> Result<bool>;
}

pub struct PositionResolver;

impl PositionResolver {
    pub async fn resolve(
        checkpoint: Option<&Position>,
        configured_start: Option<&StartConfig>,
        validator: &dyn JournalValidator,
    ) -> Result<Option<Position>> {
        let position = if let Some(position) = checkpoint {
            info!(
                "Resuming from checkpoint position {} (file sequence {:?})",
                position,
                position.file_sequence()
            );
            Some(position.clone())
        } else if let Some(start) = configured_start.filter(|s| !s.is_empty()) {
            let position = Position {
                journal_name: start.journal_name.clone().unwrap_or_default(),
                position: start.position.unwrap_or_default(),
                timestamp: start.timestamp.unwrap_or_default(),
            };
            info!(
                "Starting from configured position {} (timestamp {})",
                position, position.timestamp
            );
            Some(position)
        } else {
            info!("No start position, streaming from server head");
            None
        };

        if let Some(ref position) = position {
            if position.has_journal() && !validator.exists(&position.journal_name).await? {
                return Err(CdcError::ConfigurationError(format!(
                    "Can't find journalName: {}",
                    position.journal_name
                )));
            }
        }

        Ok(position)
    }
}
