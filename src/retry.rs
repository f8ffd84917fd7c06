//! 고정 간격 재시도

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// `op` 을 최대 `max_attempts` 번 실행하며, 실패 사이에 `delay` 만큼 쉰다.
///
/// 간격은 매번 동일합니다 (지수 증가 없음). 마지막 에러를 그대로 돌려줍니다.
/// `is_fatal()` 인 에러는 재시도 없이 바로 돌려줍니다.
pub async fn execute_with_retry<T, F, Fut>(
    mut op: F,
    max_attempts: u32,
    delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_fatal() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
