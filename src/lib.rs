//! MySQL Binlog CDC 소스
//!
//! MySQL 바이너리 로그의 행 변경 이벤트를 bounded 큐를 통해 소비자에게
//! 전달하고, 마지막으로 확인된 위치부터 재시작합니다.
//! 주요 기능:
//! - 체크포인트/사용자 지정 좌표 기반 시작 위치 결정
//! - REPLICATION 및 테이블 SELECT 권한 사전 검사
//! - 스키마/테이블 필터 생성
//! - 병렬 split 중 하나만 binlog 를 읽도록 보장

pub mod authority;
pub mod binlog_client;
pub mod cdc_engine;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod filter;
pub mod offset;
pub mod resolver;
pub mod retry;
pub mod sink;
pub mod split;

#[cfg(test)]
mod testing;

pub use binlog_client::{BinlogClient, BinlogClientFactory, ClientSettings};
pub use cdc_engine::{CdcEngine, EngineState};
pub use config::BinlogConfig;
pub use error::{CdcError, Result};
pub use events::{ChangeEvent, OperationType, Record};
pub use offset::{CheckpointState, Position};
pub use sink::EventSink;
pub use split::{create_splits, InputSplit};
