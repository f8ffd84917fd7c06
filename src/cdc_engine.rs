//! MySQL CDC 엔진 - 권한 검사, 위치 결정, binlog 스트리밍 수명 관리
//!
//! 상태 전이:
//! `Idle → AuthorityChecked → Streaming → Stopped`, 실패 시 `Failed`
//!
//! 0번 split 만 외부 binlog 클라이언트를 시작합니다. 나머지 split 의
//! `next()` 는 스트리밍 상태에 도달하지 않으므로 `close()` 까지 대기합니다.

use crate::authority::{AuthorityChecker, SessionFactory, RETRY_DELAY, RETRY_TIMES};
use crate::binlog_client::{BinlogClient, BinlogClientFactory, ClientSettings};
use crate::config::BinlogConfig;
use crate::connection::{ConnectionConfig, MySqlJournalValidator, MySqlSessionFactory};
use crate::error::{CdcError, Result};
use crate::events::Record;
use crate::filter::{FilterBuilder, FilterSpec, TableFilter};
use crate::offset::{CheckpointState, Position};
use crate::resolver::{JournalValidator, PositionResolver};
use crate::sink::{AlarmObserver, EventSink, LoggingAlarm};
use crate::split::InputSplit;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// 엔진 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    AuthorityChecked,
    Streaming,
    Stopped,
    Failed,
}

/// 스트리밍 없이 검사만 수행한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    pub filter: FilterSpec,
    pub start_position: Option<Position>,
}

/// MySQL CDC 엔진
pub struct CdcEngine {
    config: BinlogConfig,
    client_factory: Arc<dyn BinlogClientFactory>,
    session_factory: Arc<dyn SessionFactory>,
    journal_validator: Arc<dyn JournalValidator>,
    alarm_observer: Arc<dyn AlarmObserver>,
    sink: Arc<EventSink>,
    client: Mutex<Option<Box<dyn BinlogClient>>>,
    state: watch::Sender<EngineState>,
    authority_retry: (u32, Duration),
}

impl CdcEngine {
    /// MySQL 연결 기반 권한 검사기와 binlog 파일 검증기를 사용하는 엔진
    pub fn new(
        config: BinlogConfig,
        client_factory: Arc<dyn BinlogClientFactory>,
    ) -> Result<Self> {
        let session_factory = Arc::new(MySqlSessionFactory::new(ConnectionConfig::from_jdbc(
            &config,
        )?));
        let journal_validator = Arc::new(MySqlJournalValidator::new(
            ConnectionConfig::from_master(&config),
        ));
        Self::with_collaborators(config, client_factory, session_factory, journal_validator)
    }

    pub fn with_collaborators(
        config: BinlogConfig,
        client_factory: Arc<dyn BinlogClientFactory>,
        session_factory: Arc<dyn SessionFactory>,
        journal_validator: Arc<dyn JournalValidator>,
    ) -> Result<Self> {
        config.validate()?;
        let sink = Arc::new(EventSink::new(
            config.queue_size,
            config.categories()?,
            config.paving_data,
        ));
        let (state, _) = watch::channel(EngineState::Idle);

        Ok(CdcEngine {
            config,
            client_factory,
            session_factory,
            journal_validator,
            alarm_observer: Arc::new(LoggingAlarm),
            sink,
            client: Mutex::new(None),
            state,
            authority_retry: (RETRY_TIMES, RETRY_DELAY),
        })
    }

    pub fn with_alarm_observer(mut self, alarm_observer: Arc<dyn AlarmObserver>) -> Self {
        self.alarm_observer = alarm_observer;
        self
    }

    pub fn with_authority_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.authority_retry = (max_attempts, delay);
        self
    }

    pub fn config(&self) -> &BinlogConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// split 단위 시작. 0번이 아니면 아무것도 하지 않습니다.
    pub async fn open_split(
        &self,
        split: InputSplit,
        checkpoint: Option<&CheckpointState>,
    ) -> Result<()> {
        if !split.is_reader() {
            info!("binlog open split number:{} abort...", split.index);
            return Ok(());
        }
        info!("binlog open split number:{} start...", split.index);
        self.open(checkpoint).await
    }

    /// 권한 검사 후 binlog 클라이언트를 시작합니다.
    pub async fn open(&self, checkpoint: Option<&CheckpointState>) -> Result<()> {
        let current = self.state();
        if current != EngineState::Idle {
            return Err(CdcError::InvalidState(format!(
                "open 은 Idle 상태에서만 가능합니다 (현재: {:?})",
                current
            )));
        }

        info!("binlog config: {:?}", self.config);
        match self.start_streaming(checkpoint).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to open binlog reader: {}", e);
                // close() 가 먼저 끝났다면 Stopped 유지
                self.state.send_if_modified(|s| {
                    if *s == EngineState::Stopped {
                        false
                    } else {
                        *s = EngineState::Failed;
                        true
                    }
                });
                Err(e)
            }
        }
    }

    /// 현재 상태가 `from` 일 때만 `to` 로 전이
    fn transition(&self, from: EngineState, to: EngineState) -> Result<()> {
        let mut current = from;
        let moved = self.state.send_if_modified(|s| {
            current = *s;
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        });
        if moved {
            Ok(())
        } else {
            Err(CdcError::InvalidState(format!(
                "{:?} 로 전이할 수 없습니다 (현재: {:?})",
                to, current
            )))
        }
    }

    async fn start_streaming(&self, checkpoint: Option<&CheckpointState>) -> Result<()> {
        let spec = self.check_authority().await?;
        self.transition(EngineState::Idle, EngineState::AuthorityChecked)?;

        let filter = TableFilter::parse(&spec.filter)?;
        let start_position = self.resolve_position(checkpoint).await?;
        if let Some(ref position) = start_position {
            self.sink.advance_position(position.clone());
        }

        let settings = ClientSettings::from_config(
            &self.config,
            Some(filter),
            start_position,
            self.sink.clone(),
            self.alarm_observer.clone(),
        );
        debug!("Creating binlog client with {:?}", settings);

        let mut client = self.client_factory.create(settings)?;
        client.start()?;

        // close() 는 같은 잠금 안에서 Stopped 로 바꾸므로 여기서 확인하면 충분
        let mut slot = self.client.lock();
        if let Err(e) = self.transition(EngineState::AuthorityChecked, EngineState::Streaming) {
            warn!("Engine closed while opening, stopping binlog client");
            if let Err(stop_err) = client.stop() {
                warn!("Failed to stop binlog client: {}", stop_err);
            }
            return Err(e);
        }
        *slot = Some(client);
        drop(slot);

        info!("Binlog streaming started with filter {}", spec.filter);
        Ok(())
    }

    /// 필터를 만들고 권한을 검사합니다. 상태는 바꾸지 않습니다.
    async fn check_authority(&self) -> Result<FilterSpec> {
        let database = self.config.jdbc()?.database;
        let spec = FilterBuilder::build(&database, &self.config.tables);
        let (max_attempts, delay) = self.authority_retry;
        let checker = AuthorityChecker::new(
            self.session_factory.clone(),
            self.config.jdbc_url.clone(),
            self.config.username.clone(),
        )
        .with_retry(max_attempts, delay);

        if self.config.tables.is_empty() {
            checker.check(Some(&database), Vec::new()).await?;
        } else {
            checker.check(None, spec.probe_targets.clone()).await?;
        }
        Ok(spec)
    }

    async fn resolve_position(
        &self,
        checkpoint: Option<&CheckpointState>,
    ) -> Result<Option<Position>> {
        PositionResolver::resolve(
            checkpoint.and_then(|c| c.position.as_ref()),
            self.config.start.as_ref(),
            self.journal_validator.as_ref(),
        )
        .await
    }

    /// 클라이언트를 시작하지 않고 필터, 권한, 시작 위치만 확인합니다.
    pub async fn preflight(&self, checkpoint: Option<&CheckpointState>) -> Result<Preflight> {
        let filter = self.check_authority().await?;
        TableFilter::parse(&filter.filter)?;
        let start_position = self.resolve_position(checkpoint).await?;
        Ok(Preflight {
            filter,
            start_position,
        })
    }

    /// 다음 레코드
    ///
    /// 스트리밍 상태가 될 때까지 대기합니다. 종료 후에는 `Ok(None)`.
    pub async fn next(&self) -> Result<Option<Record>> {
        let mut state = self.state.subscribe();
        let current = *state
            .wait_for(|s| {
                matches!(
                    s,
                    EngineState::Streaming | EngineState::Stopped | EngineState::Failed
                )
            })
            .await
            .map_err(|_| CdcError::ChannelClosed)?;

        match current {
            EngineState::Streaming => match self.sink.take_event().await {
                Err(e) => {
                    error!("Binlog stream failed: {}", e);
                    self.state.send_if_modified(|s| {
                        if *s == EngineState::Streaming {
                            *s = EngineState::Failed;
                            true
                        } else {
                            false
                        }
                    });
                    Err(e)
                }
                other => other,
            },
            EngineState::Failed => Err(CdcError::InvalidState(
                "엔진이 실패 상태입니다".to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// binlog 는 끝나지 않는 스트림
    pub fn reached_end(&self) -> bool {
        false
    }

    /// 체크포인트 스냅샷. 체크포인트가 꺼져 있으면 None.
    pub fn checkpoint(&self) -> Option<CheckpointState> {
        if !self.config.restore {
            debug!("return None for checkpoint state");
            return None;
        }
        let state = CheckpointState::new(self.sink.latest_position());
        debug!("Checkpoint at {:?}", state.position);
        Some(state)
    }

    pub fn sink(&self) -> &Arc<EventSink> {
        &self.sink
    }

    /// 엔진 종료. 여러 번 호출해도 됩니다.
    pub async fn close(&self) -> Result<()> {
        let client = {
            let mut slot = self.client.lock();
            self.state.send_if_modified(|s| {
                if *s == EngineState::Stopped {
                    false
                } else {
                    *s = EngineState::Stopped;
                    true
                }
            });
            slot.take()
        };
        self.sink.close();

        if let Some(mut client) = client {
            if client.is_running() {
                client.stop().map_err(|e| {
                    warn!("Failed to stop binlog client: {}", e);
                    e
                })?;
            }
            info!(
                "binlog closed, position: {:?}",
                self.sink.latest_position()
            );
        }
        Ok(())
    }
}
