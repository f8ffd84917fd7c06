//! 스키마/테이블 필터 생성
//!
//! 사용자 테이블 패턴을 `schema.table` 형식의 정규식 목록으로 만들고,
//! 권한 검사에 쓸 스키마별 대표 테이블을 고릅니다.

use crate::error::{CdcError, Result};
use regex::{Regex, RegexBuilder};

const SCHEMA_SPLIT: char = '.';

/// 필터 생성 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// 콤마로 구분된 정규식 (e.g., "db.t1,s.t2")
    pub filter: String,
    /// 스키마당 하나의 대표 테이블
    pub probe_targets: Vec<String>,
}

pub struct FilterBuilder;

impl FilterBuilder {
    pub fn build(database: &str, tables: &[String]) -> FilterSpec {
        if tables.is_empty() {
            return FilterSpec {
                filter: format!("{}\\..*", database),
                probe_targets: Vec::new(),
            };
        }

        let qualified: Vec<String> = tables
            .iter()
            .map(|t| format_table_name(database, t))
            .collect();

        let mut schemas: Vec<&str> = Vec::new();
        let mut probe_targets = Vec::new();
        for table in &qualified {
            let schema = table.split(SCHEMA_SPLIT).next().unwrap_or_default();
            if !schemas.contains(&schema) {
                schemas.push(schema);
                probe_targets.push(table.clone());
            }
        }

        FilterSpec {
            filter: qualified.join(","),
            probe_targets,
        }
    }
}

/// 스키마가 없으면 `database.table` 로 만든다. '.' 이 이미 있으면 그대로 둔다.
pub fn format_table_name(database: &str, table: &str) -> String {
    if table.contains(SCHEMA_SPLIT) {
        table.to_string()
    } else {
        format!("{}{}{}", database, SCHEMA_SPLIT, table)
    }
}

/// 컴파일된 테이블 필터
///
/// 각 패턴은 `schema.table` 전체와 대소문자 구분 없이 매칭됩니다.
#[derive(Debug, Clone)]
pub struct TableFilter {
    source: String,
    patterns: Vec<Regex>,
}

impl TableFilter {
    pub fn parse(filter: &str) -> Result<Self> {
        let patterns = filter
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                RegexBuilder::new(&format!("^(?:{})$", p))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        CdcError::ConfigurationError(format!("잘못된 테이블 패턴 {}: {}", p, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TableFilter {
            source: filter.to_string(),
            patterns,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, schema: &str, table: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let name = format!("{}{}{}", schema, SCHEMA_SPLIT, table);
        self.patterns.iter().any(|p| p.is_match(&name))
    }
}
