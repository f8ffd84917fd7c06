//! Binlog 리더 설정
//!
//! 작업 설정(JSON)의 옵션 이름을 그대로 사용합니다.
//! 생성 후에는 읽기 전용입니다.

use crate::error::{CdcError, Result};
use crate::events::OperationType;
use serde::Deserialize;
use std::fmt;

const JDBC_MYSQL_PREFIX: &str = "jdbc:mysql://";

/// 사용자가 지정한 시작 좌표 (`start` 옵션)
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartConfig {
    pub journal_name: Option<String>,
    pub timestamp: Option<i64>,
    pub position: Option<u64>,
}

impl StartConfig {
    pub fn is_empty(&self) -> bool {
        self.journal_name.is_none() && self.timestamp.is_none() && self.position.is_none()
    }
}

/// Binlog 리더 설정
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinlogConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub jdbc_url: String,
    /// 테이블 패턴 목록 (비어 있으면 스키마 전체)
    #[serde(default, rename = "table")]
    pub tables: Vec<String>,
    /// 수집할 이벤트 종류 (e.g., "insert,update")
    #[serde(default)]
    pub cat: Option<String>,
    #[serde(default)]
    pub start: Option<StartConfig>,
    /// 복제 식별용 server id
    #[serde(default = "default_slave_id")]
    pub slave_id: u32,
    #[serde(default)]
    pub gtid_mode: bool,
    #[serde(default = "default_charset")]
    pub connection_charset: String,
    #[serde(default = "default_true")]
    pub enable_tsdb: bool,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_parallel_thread_size")]
    pub parallel_thread_size: usize,
    #[serde(default = "default_true")]
    pub detecting_enable: bool,
    #[serde(default = "default_detecting_sql")]
    pub detecting_sql: String,
    /// 중첩 필드를 한 단계로 펼칠지 여부
    #[serde(default)]
    pub paving_data: bool,
    /// EventSink 큐 용량
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// 체크포인트 사용 여부
    #[serde(default, rename = "isRestore")]
    pub restore: bool,
}

fn default_port() -> u16 {
    3306
}

fn default_slave_id() -> u32 {
    3344
}

fn default_charset() -> String {
    "UTF-8".to_string()
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    256
}

fn default_parallel_thread_size() -> usize {
    2
}

fn default_detecting_sql() -> String {
    "SELECT 1".to_string()
}

fn default_queue_size() -> usize {
    1000
}

impl BinlogConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        jdbc_url: impl Into<String>,
    ) -> Self {
        BinlogConfig {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: String::new(),
            jdbc_url: jdbc_url.into(),
            tables: Vec::new(),
            cat: None,
            start: None,
            slave_id: default_slave_id(),
            gtid_mode: false,
            connection_charset: default_charset(),
            enable_tsdb: true,
            parallel: true,
            buffer_size: default_buffer_size(),
            parallel_thread_size: default_parallel_thread_size(),
            detecting_enable: true,
            detecting_sql: default_detecting_sql(),
            paving_data: false,
            queue_size: default_queue_size(),
            restore: false,
        }
    }

    /// JSON 작업 설정에서 읽기
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BinlogConfig = serde_json::from_str(json)
            .map_err(|e| CdcError::ConfigurationError(format!("잘못된 설정: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(CdcError::ConfigurationError(
                "queueSize 는 0 보다 커야 합니다".to_string(),
            ));
        }
        JdbcUrl::parse(&self.jdbc_url)?;
        self.categories()?;
        Ok(())
    }

    pub fn jdbc(&self) -> Result<JdbcUrl> {
        JdbcUrl::parse(&self.jdbc_url)
    }

    /// `cat` 옵션을 이벤트 종류 목록으로 변환 (비어 있으면 전체 허용)
    pub fn categories(&self) -> Result<Vec<OperationType>> {
        match self.cat.as_deref() {
            Some(cat) if !cat.trim().is_empty() => cat
                .split(',')
                .map(|c| c.trim().parse::<OperationType>())
                .collect(),
            _ => Ok(Vec::new()),
        }
    }
}

impl fmt::Debug for BinlogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinlogConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("jdbc_url", &self.jdbc_url)
            .field("tables", &self.tables)
            .field("cat", &self.cat)
            .field("start", &self.start)
            .field("slave_id", &self.slave_id)
            .field("gtid_mode", &self.gtid_mode)
            .field("connection_charset", &self.connection_charset)
            .field("paving_data", &self.paving_data)
            .field("queue_size", &self.queue_size)
            .field("restore", &self.restore)
            .finish()
    }
}

/// `jdbc:mysql://host[:port]/database[?params]` 파싱 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JdbcUrl {
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
}

impl JdbcUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix(JDBC_MYSQL_PREFIX).ok_or_else(|| {
            CdcError::ConfigurationError(format!("지원하지 않는 jdbcUrl 형식: {}", url))
        })?;

        let (authority, path) = rest.split_once('/').ok_or_else(|| {
            CdcError::ConfigurationError(format!("jdbcUrl 에 database 가 없습니다: {}", url))
        })?;

        // 파라미터 값에도 '/' 가 올 수 있으므로 첫 '?' 까지만
        let database = path.split_once('?').map_or(path, |(database, _)| database);
        if database.is_empty() {
            return Err(CdcError::ConfigurationError(format!(
                "jdbcUrl 에 database 가 없습니다: {}",
                url
            )));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    CdcError::ConfigurationError(format!("jdbcUrl 포트가 잘못되었습니다: {}", url))
                })?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        Ok(JdbcUrl {
            host: host.to_string(),
            port,
            database: database.to_string(),
        })
    }
}
