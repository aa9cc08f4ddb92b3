//! 재조립 통계
//!
//! 패킷 단위 이상은 전부 로컬에서 흡수되므로 가시성은 카운터가 전부임

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

/// 프래그먼트 도착 기록
#[derive(Debug, Clone, Copy)]
struct FragmentArrival {
    timestamp: Instant,
    sample_count: usize,
}

/// 재조립 통계 (재조립 태스크 단독 소유)
#[derive(Debug, Clone)]
pub struct ReassemblyStats {
    /// 시작 시간
    pub started_at: Instant,

    /// 총 수신 프래그먼트 수 (디코딩 성공 기준)
    pub total_fragments: u64,

    /// 버퍼에 적용된 프래그먼트 수
    pub applied_fragments: u64,

    /// 디코딩 실패 데이터그램 수 (too short / size mismatch)
    pub malformed_packets: u64,

    /// 범위 초과 프래그먼트 수
    pub out_of_range_fragments: u64,

    /// 중복 프래그먼트 수 (에러 아님, UDP에서 정상)
    pub duplicate_fragments: u64,

    /// 닫힌(완료/축출) 윈도우로 뒤늦게 도착한 프래그먼트 수
    pub stale_fragments: u64,

    /// 완료된 윈도우 수
    pub completed_windows: u64,

    /// 축출된 윈도우 수 (미완료 폐기)
    pub evicted_windows: u64,

    /// 방출 큐 포화로 버려진 완료 윈도우 수
    pub sink_dropped_windows: u64,

    /// 최근 도착 기록 (도착률 계산용)
    arrivals: VecDeque<FragmentArrival>,

    /// 도착 기록 윈도우 크기
    window_size: usize,
}

impl ReassemblyStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            started_at: Instant::now(),
            total_fragments: 0,
            applied_fragments: 0,
            malformed_packets: 0,
            out_of_range_fragments: 0,
            duplicate_fragments: 0,
            stale_fragments: 0,
            completed_windows: 0,
            evicted_windows: 0,
            sink_dropped_windows: 0,
            arrivals: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// 프래그먼트 도착 기록
    pub fn record_arrival(&mut self, sample_count: usize) {
        if self.arrivals.len() >= self.window_size {
            self.arrivals.pop_front();
        }
        self.arrivals.push_back(FragmentArrival {
            timestamp: Instant::now(),
            sample_count,
        });
        self.total_fragments += 1;
    }

    /// 프래그먼트 도착률 계산 (fragments/sec)
    pub fn fragment_rate(&self) -> f64 {
        if self.arrivals.len() < 2 {
            return 0.0;
        }

        let first = self.arrivals.front().unwrap().timestamp;
        let last = self.arrivals.back().unwrap().timestamp;
        let duration = last.duration_since(first);

        if duration.is_zero() {
            return 0.0;
        }

        (self.arrivals.len() - 1) as f64 / duration.as_secs_f64()
    }

    /// 샘플 처리율 계산 (samples/sec)
    pub fn sample_throughput(&self) -> f64 {
        if self.arrivals.len() < 2 {
            return 0.0;
        }

        let first = self.arrivals.front().unwrap().timestamp;
        let last = self.arrivals.back().unwrap().timestamp;
        let duration = last.duration_since(first);

        if duration.is_zero() {
            return 0.0;
        }

        let total: usize = self.arrivals.iter().map(|a| a.sample_count).sum();
        total as f64 / duration.as_secs_f64()
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 버려진 프래그먼트 총합 (malformed + 범위 초과 + stale)
    ///
    /// 중복은 UDP에서 기대되는 동작이므로 별도 집계
    pub fn dropped_fragment_count(&self) -> u64 {
        self.malformed_packets + self.out_of_range_fragments + self.stale_fragments
    }

    /// 외부 공개용 스냅샷 생성
    pub fn snapshot(&self, open_window_count: usize) -> StatsSnapshot {
        StatsSnapshot {
            open_window_count,
            completed_window_count: self.completed_windows,
            dropped_fragment_count: self.dropped_fragment_count(),
            evicted_window_count: self.evicted_windows,
            total_fragments: self.total_fragments,
            applied_fragments: self.applied_fragments,
            malformed_packets: self.malformed_packets,
            out_of_range_fragments: self.out_of_range_fragments,
            duplicate_fragments: self.duplicate_fragments,
            stale_fragments: self.stale_fragments,
            sink_dropped_windows: self.sink_dropped_windows,
            fragment_rate: self.fragment_rate(),
            sample_throughput: self.sample_throughput(),
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }
}

impl Default for ReassemblyStats {
    fn default() -> Self {
        Self::new(240)
    }
}

/// 헬스/통계 조회 응답 (운영 표면 노출용)
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// 현재 오픈 윈도우 수
    pub open_window_count: usize,

    /// 완료된 윈도우 수
    pub completed_window_count: u64,

    /// 버려진 프래그먼트 수 (malformed + 범위 초과 + stale)
    pub dropped_fragment_count: u64,

    /// 축출된 윈도우 수
    pub evicted_window_count: u64,

    /// 총 수신 프래그먼트 수
    pub total_fragments: u64,

    /// 적용된 프래그먼트 수
    pub applied_fragments: u64,

    /// 디코딩 실패 수
    pub malformed_packets: u64,

    /// 범위 초과 수
    pub out_of_range_fragments: u64,

    /// 중복 수
    pub duplicate_fragments: u64,

    /// 닫힌 윈도우로 뒤늦게 도착한 수
    pub stale_fragments: u64,

    /// 방출 큐 포화로 버려진 완료 윈도우 수
    pub sink_dropped_windows: u64,

    /// 프래그먼트 도착률 (fragments/sec)
    pub fragment_rate: f64,

    /// 샘플 처리율 (samples/sec)
    pub sample_throughput: f64,

    /// 경과 시간 (초)
    pub elapsed_secs: f64,
}

impl StatsSnapshot {
    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.1}s | Windows: {} open, {} done, {} evicted | Fragments: {} ({:.0}/s) | Dropped: {} | Dup: {} | Sink drops: {}",
            self.elapsed_secs,
            self.open_window_count,
            self.completed_window_count,
            self.evicted_window_count,
            self.total_fragments,
            self.fragment_rate,
            self.dropped_fragment_count,
            self.duplicate_fragments,
            self.sink_dropped_windows,
        )
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        ReassemblyStats::default().snapshot(0)
    }
}
