//! 병렬 split 구성
//!
//! 엔진은 병렬도만큼 split 을 요구하지만, 같은 server id 로 복제 연결은
//! 하나만 존재해야 합니다. 0번 split 만 binlog 를 읽고 나머지는 대기합니다.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSplit {
    pub index: usize,
    pub total: usize,
}

impl InputSplit {
    pub fn new(index: usize, total: usize) -> Self {
        InputSplit { index, total }
    }

    /// binlog 를 실제로 읽는 split 인지 여부
    pub fn is_reader(&self) -> bool {
        self.index == 0
    }
}

pub fn create_splits(n: usize) -> Vec<InputSplit> {
    (0..n).map(|i| InputSplit::new(i, n)).collect()
}
