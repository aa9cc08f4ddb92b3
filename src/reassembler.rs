//! 윈도우 재조립 상태 머신
//!
//! 윈도우 ID별 상태 전이: `Absent → Open → {Completed, Evicted}`.
//! 한 번 Completed/Evicted가 된 ID는 다시 Open으로 돌아가지 않음:
//! 닫힌 ID는 유한 링에 기억되고, 그 ID로 늦게 도착한 프래그먼트는
//! stale로 버려짐. 링 크기(`closed_history_size`)를 벗어날 만큼 오래된
//! ID는 더 이상 구분할 수 없음 (송신측 ID가 단조 증가라 실질 문제 없음).
//!
//! 완전히 반응형임: 블록하지 않고, 재시도하지 않고, 재전송 요청도 없음
//! (UDP 단방향이므로 돌려보낼 채널 자체가 없음)

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::Config;
use crate::packet::{Fragment, WindowId};
use crate::stats::ReassemblyStats;
use crate::window::{FragmentOutcome, WindowBuffer};

/// 완료된 윈도우 (싱크로 방출되는 값)
#[derive(Debug, Clone)]
pub struct CompletedWindow {
    /// 윈도우 ID
    pub window_id: WindowId,

    /// 조립 완료된 샘플 배열 (길이 == window_capacity)
    pub samples: Vec<f32>,

    /// 샘플링 주파수 (Hz)
    pub sample_rate: u32,

    /// 완료 감지 시점
    pub completed_at: Instant,

    /// 첫 프래그먼트 도착부터 완료까지 걸린 시간
    pub completion_latency: Duration,
}

/// 윈도우 재조립기
///
/// `open_windows`는 이 인스턴스가 단독 소유함. 여러 수신 경로가 먹이려면
/// 채널로 직렬화해서 단일 태스크에서 돌릴 것 ([`crate::Listener`]가 그 방식)
pub struct WindowReassembler {
    /// 설정
    config: Config,

    /// 진행 중인 윈도우 (windowId → 버퍼, 크기 상한 max_open_windows)
    open_windows: HashMap<WindowId, WindowBuffer>,

    /// 최근 닫힌 윈도우 ID (완료/축출, 재오픈 방지용 유한 링)
    closed_ring: VecDeque<WindowId>,
    closed_set: HashSet<WindowId>,

    /// 통계
    stats: ReassemblyStats,
}

impl WindowReassembler {
    /// 새 재조립기 생성
    pub fn new(config: Config) -> Self {
        let stats = ReassemblyStats::new(config.stats_window_size);
        Self {
            open_windows: HashMap::with_capacity(config.max_open_windows),
            closed_ring: VecDeque::with_capacity(config.closed_history_size),
            closed_set: HashSet::with_capacity(config.closed_history_size),
            config,
            stats,
        }
    }

    /// 프래그먼트 하나를 라우팅/적용하고, 윈도우가 완성되면 반환
    pub fn ingest(&mut self, fragment: Fragment) -> Option<CompletedWindow> {
        self.stats.record_arrival(fragment.samples.len());

        // 이미 닫힌(완료/축출) 윈도우의 뒷북 프래그먼트는 버림
        if self.closed_set.contains(&fragment.window_id) {
            self.stats.stale_fragments += 1;
            debug!(
                "닫힌 윈도우 {}에 늦은 프래그먼트 도착 (seq={}), 무시",
                fragment.window_id, fragment.sequence_id
            );
            return None;
        }

        // 새 윈도우가 열리기 전에 메모리 상한 확보
        if !self.open_windows.contains_key(&fragment.window_id)
            && self.open_windows.len() >= self.config.max_open_windows
        {
            self.evict_oldest();
        }

        let capacity = self.config.window_capacity;
        let buffer = self
            .open_windows
            .entry(fragment.window_id)
            .or_insert_with(|| {
                debug!("윈도우 {} 오픈", fragment.window_id);
                WindowBuffer::new(fragment.window_id, capacity)
            });

        match buffer.apply_fragment(&fragment) {
            FragmentOutcome::Applied => {
                self.stats.applied_fragments += 1;
            }
            FragmentOutcome::DuplicateIgnored => {
                self.stats.duplicate_fragments += 1;
                return None;
            }
            FragmentOutcome::OutOfRange => {
                // 불량 프래그먼트 하나 때문에 윈도우를 버리지 않음.
                // 나머지 정상 프래그먼트로 여전히 완성될 수 있음
                self.stats.out_of_range_fragments += 1;
                warn!(
                    "범위 초과 프래그먼트: window={}, offset={}, length={}, capacity={}",
                    fragment.window_id,
                    fragment.offset,
                    fragment.length,
                    self.config.window_capacity
                );
                return None;
            }
        }

        if buffer.is_complete(self.config.expected_fragments_per_window) {
            return self.complete_window(fragment.window_id);
        }

        None
    }

    /// 디코딩 실패 집계 (리스너 수신 경로에서 호출)
    pub fn record_malformed(&mut self) {
        self.stats.malformed_packets += 1;
    }

    /// 방출 큐 포화 집계
    pub fn record_sink_drop(&mut self) {
        self.stats.sink_dropped_windows += 1;
    }

    /// 현재 오픈 윈도우 수
    pub fn open_window_count(&self) -> usize {
        self.open_windows.len()
    }

    /// 통계 스냅샷
    pub fn snapshot(&self) -> crate::stats::StatsSnapshot {
        self.stats.snapshot(self.open_windows.len())
    }

    fn complete_window(&mut self, window_id: WindowId) -> Option<CompletedWindow> {
        let buffer = self.open_windows.remove(&window_id)?;
        let completed_at = Instant::now();
        let completion_latency = completed_at.duration_since(buffer.created_at);

        self.remember_closed(window_id);
        self.stats.completed_windows += 1;

        debug!(
            "윈도우 {} 완료: {} fragments, {:.2}ms",
            window_id,
            buffer.fragments_received(),
            completion_latency.as_secs_f64() * 1000.0
        );

        Some(CompletedWindow {
            window_id,
            samples: buffer.into_samples(),
            sample_rate: self.config.sample_rate,
            completed_at,
            completion_latency,
        })
    }

    /// 가장 오래된 오픈 윈도우 축출 (FIFO, 방출 없이 폐기)
    fn evict_oldest(&mut self) {
        let oldest = self
            .open_windows
            .iter()
            .min_by_key(|(_, buffer)| buffer.created_at)
            .map(|(&id, _)| id);

        if let Some(id) = oldest {
            if let Some(buffer) = self.open_windows.remove(&id) {
                self.remember_closed(id);
                self.stats.evicted_windows += 1;
                warn!(
                    "윈도우 {} 축출: {:.1}% 수신, {:.0}ms 경과",
                    id,
                    buffer.receive_ratio(self.config.expected_fragments_per_window) * 100.0,
                    buffer.created_at.elapsed().as_secs_f64() * 1000.0
                );
            }
        }
    }

    fn remember_closed(&mut self, window_id: WindowId) {
        if self.closed_ring.len() >= self.config.closed_history_size {
            if let Some(old) = self.closed_ring.pop_front() {
                self.closed_set.remove(&old);
            }
        }
        self.closed_ring.push_back(window_id);
        self.closed_set.insert(window_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Fragment;

    /// capacity 8, 프래그먼트 4샘플 × 2개짜리 테스트 설정
    fn test_config() -> Config {
        Config {
            window_capacity: 8,
            samples_per_fragment: 4,
            expected_fragments_per_window: 2,
            sample_rate: 8,
            max_open_windows: 3,
            closed_history_size: 4,
            ..Config::default()
        }
    }

    fn low_half(window_id: u32) -> Fragment {
        Fragment::new(window_id, 0, 0, vec![1.0, 2.0, 3.0, 4.0])
    }

    fn high_half(window_id: u32) -> Fragment {
        Fragment::new(window_id, 1, 4, vec![5.0, 6.0, 7.0, 8.0])
    }

    #[test]
    fn test_out_of_order_fragments_complete_window() {
        // 시나리오 A: seq=1(offset 4) 먼저, seq=0(offset 0) 나중
        let mut reassembler = WindowReassembler::new(test_config());

        assert!(reassembler.ingest(high_half(1)).is_none());
        let completed = reassembler.ingest(low_half(1)).expect("윈도우 완성");

        assert_eq!(completed.window_id, 1);
        assert_eq!(completed.samples, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(completed.sample_rate, 8);
        assert_eq!(reassembler.open_window_count(), 0);
    }

    #[test]
    fn test_duplicate_does_not_complete_prematurely() {
        // 시나리오 B: 같은 프래그먼트 두 번 + 나머지 한 번
        let mut reassembler = WindowReassembler::new(test_config());

        assert!(reassembler.ingest(low_half(1)).is_none());
        assert!(reassembler.ingest(low_half(1)).is_none());

        let completed = reassembler.ingest(high_half(1)).expect("윈도우 완성");
        assert_eq!(completed.samples, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        let snapshot = reassembler.snapshot();
        assert_eq!(snapshot.duplicate_fragments, 1);
        assert_eq!(snapshot.completed_window_count, 1);
    }

    #[test]
    fn test_capacity_pressure_evicts_oldest() {
        // 시나리오 C: max_open_windows=1, 윈도우 10 진행 중에 11 도착
        let config = Config {
            max_open_windows: 1,
            ..test_config()
        };
        let mut reassembler = WindowReassembler::new(config);

        assert!(reassembler.ingest(low_half(10)).is_none());
        assert_eq!(reassembler.open_window_count(), 1);

        assert!(reassembler.ingest(low_half(11)).is_none());
        assert_eq!(reassembler.open_window_count(), 1);

        let snapshot = reassembler.snapshot();
        assert_eq!(snapshot.evicted_window_count, 1);
        assert_eq!(snapshot.completed_window_count, 0);

        // 윈도우 11은 살아있고 정상 완료 가능
        let completed = reassembler.ingest(high_half(11)).expect("윈도우 완성");
        assert_eq!(completed.window_id, 11);
    }

    #[test]
    fn test_open_windows_never_exceed_bound() {
        let config = Config {
            max_open_windows: 2,
            ..test_config()
        };
        let mut reassembler = WindowReassembler::new(config);

        for window_id in 0..20 {
            reassembler.ingest(low_half(window_id));
            assert!(reassembler.open_window_count() <= 2);
        }
        assert_eq!(reassembler.snapshot().evicted_window_count, 18);
    }

    #[test]
    fn test_completed_window_is_never_reopened() {
        let mut reassembler = WindowReassembler::new(test_config());

        reassembler.ingest(low_half(1));
        reassembler.ingest(high_half(1));

        // 완료 후 같은 ID의 프래그먼트는 stale 처리, 윈도우는 다시 안 열림
        assert!(reassembler.ingest(low_half(1)).is_none());
        assert_eq!(reassembler.open_window_count(), 0);
        assert_eq!(reassembler.snapshot().stale_fragments, 1);
    }

    #[test]
    fn test_evicted_window_is_not_reopened() {
        let config = Config {
            max_open_windows: 1,
            ..test_config()
        };
        let mut reassembler = WindowReassembler::new(config);

        reassembler.ingest(low_half(10));
        reassembler.ingest(low_half(11)); // 윈도우 10 축출

        // 축출된 ID의 늦은 프래그먼트는 새 버퍼를 열지 않고 stale 처리
        assert!(reassembler.ingest(high_half(10)).is_none());
        assert_eq!(reassembler.open_window_count(), 1);

        let snapshot = reassembler.snapshot();
        assert_eq!(snapshot.evicted_window_count, 1);
        assert_eq!(snapshot.stale_fragments, 1);

        // 살아있는 윈도우 11은 영향 없이 완성됨
        let completed = reassembler.ingest(high_half(11)).expect("윈도우 완성");
        assert_eq!(completed.window_id, 11);
    }

    #[test]
    fn test_closed_history_is_bounded() {
        let mut reassembler = WindowReassembler::new(test_config());

        // history 크기(4)보다 많이 완료시켜도 링은 유한
        for window_id in 0..10 {
            reassembler.ingest(low_half(window_id));
            assert!(reassembler.ingest(high_half(window_id)).is_some());
        }
        assert!(reassembler.closed_ring.len() <= 4);
        assert_eq!(reassembler.closed_set.len(), reassembler.closed_ring.len());
    }

    #[test]
    fn test_out_of_range_does_not_poison_window() {
        let mut reassembler = WindowReassembler::new(test_config());

        reassembler.ingest(low_half(1));
        // offset+length > 8: 버려지고 윈도우 상태는 그대로
        reassembler.ingest(Fragment::new(1, 7, 6, vec![9.0, 9.0, 9.0]));

        let completed = reassembler.ingest(high_half(1)).expect("윈도우 완성");
        assert_eq!(completed.samples, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(reassembler.snapshot().out_of_range_fragments, 1);
    }

    #[test]
    fn test_interleaved_windows_complete_independently() {
        let mut reassembler = WindowReassembler::new(test_config());

        assert!(reassembler.ingest(low_half(1)).is_none());
        assert!(reassembler.ingest(low_half(2)).is_none());

        // 큰 번호 윈도우가 먼저 완성될 수 있음 (방출 순서 == 완료 감지 순서)
        let second = reassembler.ingest(high_half(2)).expect("윈도우 2 완성");
        assert_eq!(second.window_id, 2);

        let first = reassembler.ingest(high_half(1)).expect("윈도우 1 완성");
        assert_eq!(first.window_id, 1);
    }
}
