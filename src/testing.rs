//! 테스트용 가짜 구현 (SQL 세션, binlog 파일 검증기, binlog 클라이언트)

use crate::authority::{AuthoritySession, SessionFactory};
use crate::binlog_client::{BinlogClient, BinlogClientFactory, ClientSettings};
use crate::error::{CdcError, Result};
use crate::events::ChangeEvent;
use crate::offset::Position;
use crate::resolver::JournalValidator;
use crate::sink::{AlarmObserver, EventSink};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// 가짜 세션의 동작
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    /// 처음 N 번의 연결 시도는 실패
    pub failed_connects: u32,
    pub deny_replication: bool,
    pub schema_table: Option<String>,
    pub denied_tables: Vec<String>,
}

#[derive(Default)]
pub struct FakeSessionFactory {
    script: SessionScript,
    pub connects: AtomicU32,
    pub closed: Arc<AtomicUsize>,
    pub probed: Arc<Mutex<Vec<String>>>,
}

impl FakeSessionFactory {
    pub fn new(script: SessionScript) -> Self {
        FakeSessionFactory {
            script,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn connect(&self) -> Result<Box<dyn AuthoritySession>> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.script.failed_connects {
            return Err(CdcError::ConnectionError("connection refused".to_string()));
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            closed: self.closed.clone(),
            probed: self.probed.clone(),
        }))
    }
}

struct FakeSession {
    script: SessionScript,
    closed: Arc<AtomicUsize>,
    probed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AuthoritySession for FakeSession {
    async fn check_replication(&mut self) -> Result<()> {
        if self.script.deny_replication {
            return Err(CdcError::QueryError(
                "Access denied; you need the REPLICATION CLIENT privilege".to_string(),
            ));
        }
        Ok(())
    }

    async fn first_table(&mut self, _schema: &str) -> Result<Option<String>> {
        Ok(self.script.schema_table.clone())
    }

    async fn probe_table(&mut self, table: &str) -> Result<()> {
        self.probed.lock().push(table.to_string());
        if self.script.denied_tables.iter().any(|t| t == table) {
            return Err(CdcError::QueryError(format!(
                "SELECT command denied for table '{}'",
                table
            )));
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeJournalValidator {
    journals: Vec<String>,
    pub checked: Mutex<Vec<String>>,
}

impl FakeJournalValidator {
    pub fn new(journals: &[&str]) -> Self {
        FakeJournalValidator {
            journals: journals.iter().map(|s| s.to_string()).collect(),
            checked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl JournalValidator for FakeJournalValidator {
    async fn exists(&self, journal_name: &str) -> Result<bool> {
        self.checked.lock().push(journal_name.to_string());
        Ok(self.journals.iter().any(|j| j == journal_name))
    }
}

/// 시작 시 스크립트된 이벤트를 sink 로 보내는 가짜 클라이언트 팩토리
#[derive(Default)]
pub struct FakeClientFactory {
    script: Mutex<Vec<ChangeEvent>>,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    last_filter: Mutex<Option<String>>,
    last_start: Mutex<Option<Position>>,
    last_alarm: Mutex<Option<(String, Arc<dyn AlarmObserver>)>>,
}

impl FakeClientFactory {
    pub fn script(&self, events: Vec<ChangeEvent>) {
        *self.script.lock() = events;
    }

    pub fn last_filter(&self) -> Option<String> {
        self.last_filter.lock().clone()
    }

    pub fn last_start(&self) -> Option<Position> {
        self.last_start.lock().clone()
    }

    /// 마지막으로 만든 클라이언트가 경보를 올린 것처럼 호출
    pub fn raise_alarm(&self, message: &str) {
        if let Some((destination, observer)) = self.last_alarm.lock().as_ref() {
            observer.on_alarm(destination, message);
        }
    }
}

impl BinlogClientFactory for FakeClientFactory {
    fn create(&self, settings: ClientSettings) -> Result<Box<dyn BinlogClient>> {
        *self.last_filter.lock() = settings.filter.as_ref().map(|f| f.as_str().to_string());
        *self.last_start.lock() = settings.start_position.clone();
        *self.last_alarm.lock() = Some((
            settings.destination.clone(),
            settings.alarm_observer.clone(),
        ));
        Ok(Box::new(FakeClient {
            events: std::mem::take(&mut *self.script.lock()),
            sink: settings.sink,
            running: false,
            starts: self.starts.clone(),
            stops: self.stops.clone(),
        }))
    }
}

struct FakeClient {
    events: Vec<ChangeEvent>,
    sink: Arc<EventSink>,
    running: bool,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl BinlogClient for FakeClient {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running = true;
        let events = std::mem::take(&mut self.events);
        let sink = self.sink.clone();
        tokio::spawn(async move {
            for event in events {
                let position = event.position.clone();
                if sink.push(event).await.is_err() {
                    break;
                }
                sink.advance_position(position);
            }
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.running {
            self.running = false;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
