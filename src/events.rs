//! 변경 이벤트 타입 및 소비자에게 전달되는 레코드 정의

use crate::error::CdcError;
use crate::offset::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;

/// 소비자가 받는 한 건의 레코드
pub type Record = Map<String, Value>;

/// 셀 값 (binlog 클라이언트가 디코딩한 값, 이 크레이트에서는 해석하지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Decimal(String),
    Json(Value),
}

impl CellValue {
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Int64(i) => Value::from(*i),
            CellValue::UInt64(u) => Value::from(*u),
            CellValue::Double(d) => Value::from(*d),
            CellValue::String(s) | CellValue::Decimal(s) => Value::String(s.clone()),
            CellValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            CellValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            CellValue::Json(v) => v.clone(),
        }
    }
}

/// 변경 연산 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Insert,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }
}

impl FromStr for OperationType {
    type Err = CdcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INSERT" => Ok(OperationType::Insert),
            "UPDATE" => Ok(OperationType::Update),
            "DELETE" => Ok(OperationType::Delete),
            other => Err(CdcError::ConfigurationError(format!(
                "알 수 없는 이벤트 종류: {}",
                other
            ))),
        }
    }
}

/// CDC 변경 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 연산 타입 (INSERT, UPDATE, DELETE)
    pub op: OperationType,
    /// 이벤트 발생 시각
    pub timestamp: DateTime<Utc>,
    pub schema: String,
    pub table: String,
    /// 변경 전 데이터 (UPDATE/DELETE의 경우)
    pub before: Option<HashMap<String, CellValue>>,
    /// 변경 후 데이터 (INSERT/UPDATE의 경우)
    pub after: Option<HashMap<String, CellValue>>,
    /// 이 이벤트 바로 다음 위치
    pub position: Position,
}

impl ChangeEvent {
    pub fn new(
        op: OperationType,
        schema: impl Into<String>,
        table: impl Into<String>,
        position: Position,
    ) -> Self {
        ChangeEvent {
            op,
            timestamp: Utc::now(),
            schema: schema.into(),
            table: table.into(),
            before: None,
            after: None,
            position,
        }
    }

    pub fn with_before(mut self, row: HashMap<String, CellValue>) -> Self {
        self.before = Some(row);
        self
    }

    pub fn with_after(mut self, row: HashMap<String, CellValue>) -> Self {
        self.after = Some(row);
        self
    }

    /// 소비자용 레코드로 변환
    ///
    /// `paving` 이 켜져 있으면 before/after 맵을 `before_<col>`, `after_<col>`
    /// 키로 펼칩니다.
    pub fn into_record(self, paving: bool) -> Record {
        let mut record = Map::new();
        record.insert("type".to_string(), Value::from(self.op.as_str()));
        record.insert("schema".to_string(), Value::from(self.schema));
        record.insert("table".to_string(), Value::from(self.table));
        record.insert("ts".to_string(), Value::from(self.timestamp.timestamp_millis()));

        for (prefix, row) in [("before", self.before), ("after", self.after)] {
            let row = row.unwrap_or_default();
            if paving {
                for (column, value) in row {
                    record.insert(format!("{}_{}", prefix, column), value.to_json());
                }
            } else {
                let nested: Map<String, Value> = row
                    .into_iter()
                    .map(|(column, value)| (column, value.to_json()))
                    .collect();
                record.insert(prefix.to_string(), Value::Object(nested));
            }
        }

        record
    }
}
