//! MySQL 데이터베이스 연결 관리
//!
//! 권한 검사와 binlog 파일 확인에 쓰는 짧은 수명의 연결입니다.

use crate::authority::{AuthoritySession, SessionFactory};
use crate::config::BinlogConfig;
use crate::error::{CdcError, Result};
use crate::resolver::JournalValidator;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Row};
use tracing::{debug, warn};

const AUTHORITY_REPLICATION_TEMPLATE: &str = "SHOW MASTER STATUS";

const QUERY_SCHEMA_TABLE_TEMPLATE: &str =
    "SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? LIMIT 1";

/// MySQL 연결 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
}

impl ConnectionConfig {
    /// jdbcUrl 의 호스트와 database 로 접속 (권한 검사용)
    pub fn from_jdbc(config: &BinlogConfig) -> Result<Self> {
        let jdbc = config.jdbc()?;
        Ok(ConnectionConfig {
            hostname: jdbc.host,
            port: jdbc.port.unwrap_or(config.port),
            username: config.username.clone(),
            password: config.password.clone(),
            database: Some(jdbc.database),
        })
    }

    /// host/port 옵션으로 접속 (binlog 파일 확인용)
    pub fn from_master(config: &BinlogConfig) -> Self {
        ConnectionConfig {
            hostname: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            database: None,
        }
    }

    fn build_opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.hostname.clone())
            .tcp_port(self.port)
            .user(Some(self.username.clone()))
            .pass(Some(self.password.clone()))
            .db_name(self.database.clone())
            .into()
    }
}

/// MySQL 연결 래퍼
pub struct MySqlConnection {
    conn: Conn,
}

impl MySqlConnection {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn = Conn::new(config.build_opts()).await.map_err(|e| {
            CdcError::ConnectionError(format!(
                "Failed to connect to MySQL {}:{}: {}",
                config.hostname, config.port, e
            ))
        })?;
        debug!("Connected to MySQL at {}:{}", config.hostname, config.port);
        Ok(MySqlConnection { conn })
    }

    /// 서버에 남아 있는 binlog 파일 목록
    pub async fn get_binary_logs(&mut self) -> Result<Vec<String>> {
        let rows: Vec<Row> = self
            .conn
            .query("SHOW BINARY LOGS")
            .await
            .map_err(|e| CdcError::QueryError(format!("Failed to query binary logs: {}", e)))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.get::<String, usize>(0))
            .collect())
    }

    pub async fn close(self) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .map_err(|e| CdcError::ConnectionError(format!("Failed to disconnect: {}", e)))
    }
}

#[async_trait]
impl AuthoritySession for MySqlConnection {
    async fn check_replication(&mut self) -> Result<()> {
        self.conn
            .query_drop(AUTHORITY_REPLICATION_TEMPLATE)
            .await
            .map_err(|e| {
                CdcError::QueryError(format!("{}: {}", AUTHORITY_REPLICATION_TEMPLATE, e))
            })
    }

    async fn first_table(&mut self, schema: &str) -> Result<Option<String>> {
        self.conn
            .exec_first::<String, _, _>(QUERY_SCHEMA_TABLE_TEMPLATE, (schema,))
            .await
            .map_err(|e| {
                CdcError::QueryError(format!("Failed to query tables of {}: {}", schema, e))
            })
    }

    async fn probe_table(&mut self, table: &str) -> Result<()> {
        let query = format!("SELECT count(1) FROM {} LIMIT 1", table);
        self.conn
            .query_drop(query.as_str())
            .await
            .map_err(|e| CdcError::QueryError(format!("{}: {}", query, e)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        MySqlConnection::close(*self).await
    }
}

/// mysql_async 로 권한 검사 세션을 여는 팩토리
pub struct MySqlSessionFactory {
    config: ConnectionConfig,
}

impl MySqlSessionFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        MySqlSessionFactory { config }
    }
}

#[async_trait]
impl SessionFactory for MySqlSessionFactory {
    async fn connect(&self) -> Result<Box<dyn AuthoritySession>> {
        let conn = MySqlConnection::connect(&self.config).await?;
        Ok(Box::new(conn))
    }
}

/// `SHOW BINARY LOGS` 로 binlog 파일 존재 여부 확인
pub struct MySqlJournalValidator {
    config: ConnectionConfig,
}

impl MySqlJournalValidator {
    pub fn new(config: ConnectionConfig) -> Self {
        MySqlJournalValidator { config }
    }
}

#[async_trait]
impl JournalValidator for MySqlJournalValidator {
    async fn exists(&self, journal_name: &str) -> Result<bool> {
        let mut conn = MySqlConnection::connect(&self.config).await?;
        let logs = conn.get_binary_logs().await;
        let closed = conn.close().await;
        journal_listed(logs, closed, journal_name)
    }
}

/// 조회가 성공했다면 연결 종료 실패는 결과에 영향을 주지 않음
fn journal_listed(
    logs: Result<Vec<String>>,
    closed: Result<()>,
    journal_name: &str,
) -> Result<bool> {
    if let Err(e) = closed {
        warn!("Failed to close journal lookup connection: {}", e);
    }
    Ok(logs?.iter().any(|name| name == journal_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_from_jdbc() {
        let mut config =
            BinlogConfig::new("master", "root", "jdbc:mysql://replica:3307/shop?useSSL=false");
        config.port = 3306;
        let conn = ConnectionConfig::from_jdbc(&config).unwrap();
        assert_eq!(conn.hostname, "replica");
        assert_eq!(conn.port, 3307);
        assert_eq!(conn.database.as_deref(), Some("shop"));
    }

    #[test]
    fn test_connection_config_from_jdbc_uses_default_port() {
        let mut config = BinlogConfig::new("master", "root", "jdbc:mysql://replica/shop");
        config.port = 3310;
        let conn = ConnectionConfig::from_jdbc(&config).unwrap();
        assert_eq!(conn.port, 3310);
    }

    #[test]
    fn test_connection_config_from_master() {
        let config = BinlogConfig::new("master", "root", "jdbc:mysql://replica/shop");
        let conn = ConnectionConfig::from_master(&config);
        assert_eq!(conn.hostname, "master");
        assert_eq!(conn.database, None);
    }

    #[test]
    fn test_journal_lookup_survives_close_failure() {
        let logs = || Ok(vec!["bin.000001".to_string(), "bin.000002".to_string()]);
        let close_failed = || Err(CdcError::ConnectionError("broken pipe".to_string()));

        assert!(journal_listed(logs(), close_failed(), "bin.000002").unwrap());
        assert!(!journal_listed(logs(), close_failed(), "bin.000009").unwrap());
        assert!(matches!(
            journal_listed(
                Err(CdcError::QueryError("denied".to_string())),
                Ok(()),
                "bin.000001"
            ),
            Err(CdcError::QueryError(_))
        ));
    }

    #[tokio::test]
    #[ignore] // 실제 MySQL 연결 필요
    async fn test_journal_validator_against_server() {
        let config = BinlogConfig::new("localhost", "root", "jdbc:mysql://localhost/mysql");
        let validator = MySqlJournalValidator::new(ConnectionConfig::from_master(&config));
        assert!(!validator.exists("no-such-bin.999999").await.unwrap());
    }
}
