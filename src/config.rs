//! 프로토콜 설정

use std::time::Duration;

use crate::error::{Error, Result};
use crate::{
    DEFAULT_EXPECTED_FRAGMENTS, DEFAULT_SAMPLES_PER_FRAGMENT, DEFAULT_SAMPLE_RATE,
    DEFAULT_WINDOW_CAPACITY, HEADER_SIZE,
};

/// SWP 재조립 설정
///
/// 시작 시 한 번 주입되며 런타임 재설정은 없음
#[derive(Debug, Clone)]
pub struct Config {
    /// 윈도우 용량 (샘플 수)
    pub window_capacity: usize,

    /// 프래그먼트당 샘플 수
    pub samples_per_fragment: usize,

    /// 윈도우 완료 판정 프래그먼트 수 (고유 시퀀스 ID 기준)
    pub expected_fragments_per_window: usize,

    /// 샘플링 주파수 (Hz)
    pub sample_rate: u32,

    /// 최대 동시 오픈 윈도우 수 (초과 시 가장 오래된 윈도우 축출)
    pub max_open_windows: usize,

    /// 닫힌(완료/축출) 윈도우 ID 기억 개수 (재오픈 방지용)
    pub closed_history_size: usize,

    /// 완료 윈도우 방출 큐 깊이 (가득 차면 drop-newest)
    pub sink_queue_depth: usize,

    /// 수신 → 재조립 명령 큐 깊이
    pub cmd_queue_depth: usize,

    /// 수신 버퍼 크기 (바이트)
    pub recv_buffer_size: usize,

    /// 프래그먼트 도착률 측정 윈도우 (프래그먼트 수)
    pub stats_window_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            samples_per_fragment: DEFAULT_SAMPLES_PER_FRAGMENT,
            expected_fragments_per_window: DEFAULT_EXPECTED_FRAGMENTS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_open_windows: 3,              // 윈도우 경계에서 2개 겹침 + 여유 1
            closed_history_size: 64,
            sink_queue_depth: 8,
            cmd_queue_depth: 1024,
            recv_buffer_size: 2 * 1024 * 1024, // 2MB
            stats_window_size: 240,            // 약 2초 분량
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 손실 많은 네트워크용 설정
    ///
    /// 미완료 윈도우가 오래 머무르므로 동시 윈도우 수와 큐 깊이를 늘림
    pub fn lossy_network() -> Self {
        Self {
            max_open_windows: 8,
            closed_history_size: 256,
            sink_queue_depth: 16,
            cmd_queue_depth: 4096,
            ..Self::default()
        }
    }

    /// 개발/벤치용 소형 윈도우 설정
    pub fn short_window() -> Self {
        Self {
            window_capacity: 1024,
            samples_per_fragment: 128,
            expected_fragments_per_window: 8,
            sample_rate: 1024,
            stats_window_size: 64,
            ..Self::default()
        }
    }

    /// 설정 유효성 검사
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(Error::InvalidConfig("window_capacity는 0일 수 없음".into()));
        }
        if self.samples_per_fragment == 0 {
            return Err(Error::InvalidConfig(
                "samples_per_fragment는 0일 수 없음".into(),
            ));
        }
        if self.expected_fragments_per_window == 0 {
            return Err(Error::InvalidConfig(
                "expected_fragments_per_window는 0일 수 없음".into(),
            ));
        }
        if self.max_open_windows == 0 {
            return Err(Error::InvalidConfig("max_open_windows는 0일 수 없음".into()));
        }
        if self.sink_queue_depth == 0 || self.cmd_queue_depth == 0 {
            return Err(Error::InvalidConfig("큐 깊이는 0일 수 없음".into()));
        }
        // 예상 프래그먼트가 전부 도착하면 윈도우 용량을 넘지 않아야 함
        let covered = self.expected_fragments_per_window * self.samples_per_fragment;
        if covered > self.window_capacity {
            return Err(Error::InvalidConfig(format!(
                "expected {} × {} = {} 샘플이 window_capacity {}를 초과",
                self.expected_fragments_per_window,
                self.samples_per_fragment,
                covered,
                self.window_capacity
            )));
        }
        Ok(())
    }

    /// 정상 프래그먼트 데이터그램 크기 (바이트)
    pub fn fragment_datagram_size(&self) -> usize {
        HEADER_SIZE + self.samples_per_fragment * 4
    }

    /// 윈도우 하나가 커버하는 시간
    pub fn window_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.window_capacity as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_device_deployment() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_capacity, 38_400);
        assert_eq!(config.samples_per_fragment, 320);
        assert_eq!(config.expected_fragments_per_window, 120);
        assert_eq!(config.fragment_datagram_size(), 16 + 320 * 4);
        assert_eq!(config.window_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        let mut config = Config::short_window();
        config.max_open_windows = 0;
        assert!(config.validate().is_err());

        let mut config = Config::short_window();
        config.samples_per_fragment = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overcommitted_window() {
        let mut config = Config::short_window();
        config.expected_fragments_per_window = 9; // 9 × 128 > 1024
        assert!(config.validate().is_err());
    }
}
