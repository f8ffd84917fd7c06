//! 외부 binlog 클라이언트와의 경계
//!
//! 핸드셰이크, GTID 협상, 이벤트 디코딩은 클라이언트 구현이 담당합니다.
//! 이 크레이트는 시작 위치와 필터를 넘기고, 디코딩된 이벤트를 `EventSink`
//! 로 받으며, 확인된 위치를 `PositionObserver` 로 통지받습니다.

use crate::config::BinlogConfig;
use crate::error::Result;
use crate::filter::TableFilter;
use crate::offset::Position;
use crate::sink::{AlarmObserver, EventSink, PositionObserver};
use std::fmt;
use std::sync::Arc;

/// 클라이언트 생성에 필요한 모든 설정
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// 복제 식별용 server id
    pub server_id: u32,
    pub charset: String,
    pub gtid_mode: bool,
    pub enable_tsdb: bool,
    pub parallel: bool,
    pub parallel_buffer_size: usize,
    pub parallel_thread_size: usize,
    pub detecting_enable: bool,
    pub detecting_sql: String,
    pub destination: String,
    pub filter: Option<TableFilter>,
    /// None 이면 서버 현재 위치부터
    pub start_position: Option<Position>,
    pub sink: Arc<EventSink>,
    pub position_observer: Arc<dyn PositionObserver>,
    pub alarm_observer: Arc<dyn AlarmObserver>,
}

impl ClientSettings {
    pub fn from_config(
        config: &BinlogConfig,
        filter: Option<TableFilter>,
        start_position: Option<Position>,
        sink: Arc<EventSink>,
        alarm_observer: Arc<dyn AlarmObserver>,
    ) -> Self {
        ClientSettings {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            server_id: config.slave_id,
            charset: config.connection_charset.clone(),
            gtid_mode: config.gtid_mode,
            enable_tsdb: config.enable_tsdb,
            parallel: config.parallel,
            parallel_buffer_size: config.buffer_size,
            parallel_thread_size: config.parallel_thread_size,
            detecting_enable: config.detecting_enable,
            detecting_sql: config.detecting_sql.clone(),
            destination: "example".to_string(),
            filter,
            start_position,
            position_observer: sink.clone(),
            sink,
            alarm_observer,
        }
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("server_id", &self.server_id)
            .field("charset", &self.charset)
            .field("gtid_mode", &self.gtid_mode)
            .field("filter", &self.filter.as_ref().map(TableFilter::as_str))
            .field("start_position", &self.start_position)
            .finish()
    }
}

/// 실행 중인 binlog 클라이언트
pub trait BinlogClient: Send {
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;
}

pub trait BinlogClientFactory: Send + Sync {
    fn create(&self, settings: ClientSettings) -> Result<Box<dyn BinlogClient>>;
}
