//! binlog 클라이언트(생산자)와 소비 루프(소비자) 사이의 bounded 브리지
//!
//! - `push`: 큐가 가득 차면 대기 (유일한 흐름 제어)
//! - `take_event`: 이벤트가 올 때까지 대기, 종료되면 `Ok(None)`
//! - `advance_position`: 체크포인트용 최신 위치 기록
//!
//! 클라이언트는 이벤트를 `push` 한 뒤에 그 위치로 `advance_position` 을
//! 호출합니다. 따라서 체크포인트는 소비보다 최대 한 이벤트 앞설 수 있고,
//! 재시작 시 재전송(at-least-once)으로 보완됩니다.

use crate::error::{CdcError, Result};
use crate::events::{ChangeEvent, OperationType, Record};
use crate::offset::Position;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

/// 클라이언트가 확인한 위치가 바뀔 때 호출
pub trait PositionObserver: Send + Sync {
    fn advance(&self, position: Position);
}

/// 클라이언트 내부 경보
pub trait AlarmObserver: Send + Sync {
    fn on_alarm(&self, destination: &str, message: &str);
}

/// 경보를 로그로만 남기는 기본 구현
#[derive(Debug, Default)]
pub struct LoggingAlarm;

impl AlarmObserver for LoggingAlarm {
    fn on_alarm(&self, destination: &str, message: &str) {
        error!("Binlog alarm [{}]: {}", destination, message);
    }
}

enum SinkItem {
    Event(ChangeEvent),
    Fault(String),
}

pub struct EventSink {
    sender: mpsc::Sender<SinkItem>,
    receiver: Mutex<mpsc::Receiver<SinkItem>>,
    shutdown: watch::Sender<bool>,
    latest_position: RwLock<Option<Position>>,
    categories: Vec<OperationType>,
    paving: bool,
}

impl EventSink {
    pub fn new(capacity: usize, categories: Vec<OperationType>, paving: bool) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        EventSink {
            sender,
            receiver: Mutex::new(receiver),
            shutdown,
            latest_position: RwLock::new(None),
            categories,
            paving,
        }
    }

    /// `cat` 옵션 기준 수집 대상 여부
    pub fn accept(&self, op: OperationType) -> bool {
        self.categories.is_empty() || self.categories.contains(&op)
    }

    /// 이벤트 전달. 큐가 가득 차면 자리가 날 때까지 대기합니다.
    ///
    /// 카테고리에 맞지 않는 이벤트는 버리고 `Ok(())` 를 돌려줍니다.
    pub async fn push(&self, event: ChangeEvent) -> Result<()> {
        if !self.accept(event.op) {
            debug!(
                "Skipping {} event on {}.{}",
                event.op.as_str(),
                event.schema,
                event.table
            );
            return Ok(());
        }
        self.send(SinkItem::Event(event)).await
    }

    /// 스트림 장애 전달. 앞서 들어온 이벤트가 모두 소비된 뒤 `take_event` 에서 에러로 나옵니다.
    pub async fn fail(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        warn!("Binlog stream fault reported: {}", message);
        self.send(SinkItem::Fault(message)).await
    }

    async fn send(&self, item: SinkItem) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(CdcError::ChannelClosed);
        }
        tokio::select! {
            sent = self.sender.send(item) => sent.map_err(|_| CdcError::ChannelClosed),
            _ = shutdown.wait_for(|closed| *closed) => Err(CdcError::ChannelClosed),
        }
    }

    /// 다음 레코드. 종료되었으면 `Ok(None)`.
    pub async fn take_event(&self) -> Result<Option<Record>> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Ok(None);
        }

        let mut receiver = self.receiver.lock().await;
        let item = tokio::select! {
            item = receiver.recv() => item,
            _ = shutdown.wait_for(|closed| *closed) => None,
        };

        match item {
            Some(SinkItem::Event(event)) => Ok(Some(event.into_record(self.paving))),
            Some(SinkItem::Fault(message)) => Err(CdcError::StreamFault(message)),
            None => Ok(None),
        }
    }

    pub fn advance_position(&self, position: Position) {
        debug!("Position advanced to {}", position);
        *self.latest_position.write() = Some(position);
    }

    pub fn latest_position(&self) -> Option<Position> {
        self.latest_position.read().clone()
    }

    /// 대기 중인 `push` / `take_event` 를 모두 깨웁니다. 여러 번 호출해도 됩니다.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Event sink closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl PositionObserver for EventSink {
    fn advance(&self, position: Position) {
        self.advance_position(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CellValue;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn event(op: OperationType, offset: u64) -> ChangeEvent {
        ChangeEvent::new(op, "shop", "orders", Position::new("bin.000001", offset))
    }

    #[tokio::test]
    async fn test_take_returns_pushed_event() {
        let sink = EventSink::new(4, Vec::new(), false);
        sink.push(event(OperationType::Insert, 100)).await.unwrap();

        let record = sink.take_event().await.unwrap().unwrap();
        assert_eq!(record["type"], "INSERT");
        assert_eq!(record["table"], "orders");
    }

    #[tokio::test]
    async fn test_backpressure_blocks_producer_without_dropping() {
        let sink = Arc::new(EventSink::new(2, Vec::new(), false));
        let producer = {
            let sink = sink.clone();
            tokio::spawn(async move {
                for offset in 0..10 {
                    let event = event(OperationType::Insert, offset).with_after(HashMap::from([(
                        "seq".to_string(),
                        CellValue::Int64(offset as i64),
                    )]));
                    sink.push(event).await.unwrap();
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());
        assert_eq!(sink.sender.capacity(), 0);

        let mut offsets = Vec::new();
        while offsets.len() < 10 {
            let record = timeout(Duration::from_secs(1), sink.take_event())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            offsets.push(record["after"]["seq"].as_u64().unwrap());
        }
        producer.await.unwrap();
        assert_eq!(offsets, (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_close_unblocks_waiting_consumer() {
        let sink = Arc::new(EventSink::new(2, Vec::new(), false));
        let consumer = {
            let sink = sink.clone();
            tokio::spawn(async move { sink.take_event().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.close();

        let result = timeout(Duration::from_secs(1), consumer).await.unwrap().unwrap();
        assert!(result.unwrap().is_none());
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_close_unblocks_full_producer() {
        let sink = Arc::new(EventSink::new(1, Vec::new(), false));
        sink.push(event(OperationType::Insert, 1)).await.unwrap();

        let producer = {
            let sink = sink.clone();
            tokio::spawn(async move { sink.push(event(OperationType::Insert, 2)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.close();

        let result = timeout(Duration::from_secs(1), producer).await.unwrap().unwrap();
        assert!(matches!(result, Err(CdcError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_category_filter_drops_unlisted_ops() {
        let sink = EventSink::new(4, vec![OperationType::Delete], false);
        sink.push(event(OperationType::Insert, 1)).await.unwrap();
        sink.push(event(OperationType::Delete, 2)).await.unwrap();

        let record = sink.take_event().await.unwrap().unwrap();
        assert_eq!(record["type"], "DELETE");
        assert!(sink.accept(OperationType::Delete));
        assert!(!sink.accept(OperationType::Update));
    }

    #[tokio::test]
    async fn test_fault_surfaces_after_queued_events() {
        let sink = EventSink::new(4, Vec::new(), false);
        sink.push(event(OperationType::Insert, 1)).await.unwrap();
        sink.fail("connection reset").await.unwrap();

        assert!(sink.take_event().await.unwrap().is_some());
        assert!(matches!(
            sink.take_event().await,
            Err(CdcError::StreamFault(_))
        ));
    }

    #[test]
    fn test_latest_position_is_most_recent() {
        let sink = EventSink::new(4, Vec::new(), false);
        assert_eq!(sink.latest_position(), None);
        for offset in [4u64, 120, 4096, 8192] {
            sink.advance(Position::new("bin.000001", offset));
        }
        assert_eq!(sink.latest_position(), Some(Position::new("bin.000001", 8192)));
    }

    #[tokio::test]
    async fn test_position_advanced_after_push_is_ahead_by_at_most_one() {
        let sink = EventSink::new(4, Vec::new(), false);
        for offset in [100u64, 200] {
            sink.push(event(OperationType::Insert, offset)).await.unwrap();
            sink.advance_position(Position::new("bin.000001", offset));
        }

        // 첫 이벤트만 소비한 시점의 체크포인트는 두 번째 이벤트 위치
        sink.take_event().await.unwrap().unwrap();
        assert_eq!(sink.latest_position().unwrap().position, 200);
    }
}
