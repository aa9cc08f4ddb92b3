//! 윈도우 싱크: 완료 윈도우를 소비하는 외부 협력자 경계
//!
//! 추론/분석 서비스는 이 trait 뒤에 있음. 재조립기와는 유한 mpsc 큐로
//! 분리되어 있어 느린 소비자가 수신 루프를 멈추게 하지 못함.
//! 전달은 at-most-once: publish 실패는 로그만 남기고 재시도하지 않음

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::Result;
use crate::reassembler::CompletedWindow;

/// 완료된 윈도우 채널 수신기 타입
pub type WindowReceiver = mpsc::Receiver<CompletedWindow>;

/// 완료 윈도우 소비자 인터페이스
///
/// 구현체는 publish 안에서 오래 블록해도 수신 경로에는 영향이 없지만,
/// 큐가 차오르면 새 완료 윈도우가 버려짐 (drop-newest)
pub trait WindowSink: Send {
    /// 완료된 윈도우 하나를 전달받음
    fn publish(&mut self, window: CompletedWindow) -> Result<()>;
}

/// 방출 큐를 소비하며 싱크를 구동하는 펌프
///
/// 채널이 닫히면 종료. publish 실패는 집계 후 계속 진행
pub async fn run_sink<S: WindowSink>(mut rx: WindowReceiver, mut sink: S) -> u64 {
    let mut publish_failures = 0u64;

    while let Some(window) = rx.recv().await {
        let window_id = window.window_id;
        if let Err(e) = sink.publish(window) {
            publish_failures += 1;
            warn!("싱크 publish 실패: window={}, error={}", window_id, e);
        }
    }

    publish_failures
}

/// 로그 싱크: 윈도우 요약을 로그로 남기는 기본 소비자
///
/// 추론 서비스가 붙기 전의 대역이자 수집기 데몬의 기본 싱크
#[derive(Debug, Default)]
pub struct LogSink {
    published: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 publish된 윈도우 수
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl WindowSink for LogSink {
    fn publish(&mut self, window: CompletedWindow) -> Result<()> {
        self.published += 1;

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &sample in &window.samples {
            min = min.min(sample);
            max = max.max(sample);
        }

        info!(
            "윈도우 {} 수신: {} samples @ {}Hz, range {:.4}V ~ {:.4}V, latency {:.2}ms",
            window.window_id,
            window.samples.len(),
            window.sample_rate,
            min,
            max,
            window.completion_latency.as_secs_f64() * 1000.0
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn completed(window_id: u32) -> CompletedWindow {
        CompletedWindow {
            window_id,
            samples: vec![1.5, 2.0, 1.75],
            sample_rate: 3,
            completed_at: Instant::now(),
            completion_latency: Duration::from_millis(12),
        }
    }

    /// 실패를 흘려보내는지 확인하기 위한 싱크
    struct FlakySink;

    impl WindowSink for FlakySink {
        fn publish(&mut self, window: CompletedWindow) -> Result<()> {
            if window.window_id % 2 == 0 {
                Err(crate::Error::SinkClosed)
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_pump_drains_channel_and_counts_failures() {
        let (tx, rx) = mpsc::channel(8);

        for window_id in 0..4 {
            tx.send(completed(window_id)).await.unwrap();
        }
        drop(tx);

        let failures = run_sink(rx, FlakySink).await;
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn test_log_sink_accepts_all_windows() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(completed(1)).await.unwrap();
        tx.send(completed(2)).await.unwrap();
        drop(tx);

        let failures = run_sink(rx, LogSink::new()).await;
        assert_eq!(failures, 0);
    }
}
