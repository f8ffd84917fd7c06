/// Binlog 소스 사전 검사 도구
///
/// 작업 설정(JSON)을 읽어 필터 생성, 권한 검사, 시작 위치 확인까지 수행합니다.
/// 실제 스트리밍은 binlog 클라이언트를 연결한 엔진에서 합니다.
use mysql_binlog_source::binlog_client::{BinlogClient, BinlogClientFactory, ClientSettings};
use mysql_binlog_source::{BinlogConfig, CdcEngine, CdcError, CheckpointState, Result};
use std::env;
use std::sync::Arc;
use tracing::info;

/// 사전 검사 전용이므로 클라이언트를 만들지 않음
struct PreflightOnly;

impl BinlogClientFactory for PreflightOnly {
    fn create(&self, _settings: ClientSettings) -> Result<Box<dyn BinlogClient>> {
        Err(CdcError::ConfigurationError(
            "binlog 클라이언트가 연결되지 않았습니다".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt::init();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("BINLOG_CONFIG").ok())
        .ok_or("usage: mysql_binlog_source <job.json> [checkpoint.json]")?;
    let config = BinlogConfig::from_json(&std::fs::read_to_string(&config_path)?)?;

    let checkpoint = match env::args().nth(2) {
        Some(path) => Some(CheckpointState::from_bytes(&std::fs::read(path)?)?),
        None => None,
    };

    info!(
        "Running binlog preflight against {}:{}",
        config.host, config.port
    );

    let engine = CdcEngine::new(config, Arc::new(PreflightOnly))?;
    let preflight = engine.preflight(checkpoint.as_ref()).await?;

    info!("Table filter: {}", preflight.filter.filter);
    info!("Probed tables: {:?}", preflight.filter.probe_targets);
    match preflight.start_position {
        Some(position) => info!(
            "Start position: {} (timestamp {})",
            position, position.timestamp
        ),
        None => info!("Start position: server head"),
    }

    Ok(())
}
