//! 스트리밍 시작 전 권한 검사
//!
//! 1. REPLICATION 권한 (`SHOW MASTER STATUS`)
//! 2. 대상 테이블별 SELECT 권한 (실패한 테이블을 모두 모아서 보고)

use crate::error::{CdcError, Result};
use crate::filter::format_table_name;
use crate::retry::execute_with_retry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 연결 재시도 횟수
pub const RETRY_TIMES: u32 = 3;

/// 재시도 간격
pub const RETRY_DELAY: Duration = Duration::from_millis(2000);

/// 권한 검사에 필요한 쿼리만 노출하는 세션
#[async_trait]
pub trait AuthoritySession: Send {
    /// REPLICATION 권한이 없으면 실패
    async fn check_replication(&mut self) -> Result<()>;

    /// 스키마의 아무 테이블 하나
    async fn first_table(&mut self, schema: &str) -> Result<Option<String>>;

    /// `SELECT count(1) FROM <table> LIMIT 1`
    async fn probe_table(&mut self, table: &str) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AuthoritySession>>;
}

/// 권한 검사기
pub struct AuthorityChecker {
    factory: Arc<dyn SessionFactory>,
    jdbc_url: String,
    username: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl AuthorityChecker {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        jdbc_url: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        AuthorityChecker {
            factory,
            jdbc_url: jdbc_url.into(),
            username: username.into(),
            max_attempts: RETRY_TIMES,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// `schema` 가 주어지면 그 스키마의 테이블 하나를 검사 대상에 추가합니다.
    pub async fn check(&self, schema: Option<&str>, tables: Vec<String>) -> Result<()> {
        info!(
            "Checking source authority for user {} on {}",
            self.username, self.jdbc_url
        );

        let session = execute_with_retry(
            || self.factory.connect(),
            self.max_attempts,
            self.retry_delay,
        )
        .await
        .map_err(|e| {
            let message = format!(
                "권한 검사 연결 실패, url [{}] user [{}] ({}회 시도): {}",
                self.jdbc_url, self.username, self.max_attempts, e
            );
            error!("{}", message);
            CdcError::ConfigurationError(message)
        })?;

        let mut session = session;
        let result = self.check_session(session.as_mut(), schema, tables).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close authority session: {}", e);
        }

        result
    }

    async fn check_session(
        &self,
        session: &mut dyn AuthoritySession,
        schema: Option<&str>,
        mut tables: Vec<String>,
    ) -> Result<()> {
        if let Err(e) = session.check_replication().await {
            let message = format!(
                "jdbcUrl [{}] 설정이 올바른지, 사용자 [{}] 에게 REPLICATION SLAVE, REPLICATION CLIENT 권한이 있는지 확인하세요: {}",
                self.jdbc_url, self.username, e
            );
            error!("{}", message);
            return Err(CdcError::ConfigurationError(message));
        }

        if let Some(schema) = schema.filter(|s| !s.trim().is_empty()) {
            if let Some(table) = session.first_table(schema).await? {
                tables.push(format_table_name(schema, &table));
            }
        }

        if tables.is_empty() {
            debug!("No tables to probe");
            return Ok(());
        }

        let mut failed_tables = Vec::new();
        let mut first_cause: Option<CdcError> = None;
        for table in &tables {
            debug!("Probing SELECT permission on {}", table);
            if let Err(e) = session.probe_table(table).await {
                failed_tables.push(table.clone());
                first_cause.get_or_insert(e);
            }
        }

        if failed_tables.is_empty() {
            info!("Source authority check passed for {} tables", tables.len());
            return Ok(());
        }

        let err = CdcError::PermissionError {
            user: self.username.clone(),
            tables: failed_tables,
            cause: first_cause.map(|e| e.to_string()).unwrap_or_default(),
        };
        error!("{}", err);
        Err(err)
    }
}
