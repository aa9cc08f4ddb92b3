//! 윈도우 버퍼: 진행 중인 윈도우 하나의 재조립 상태
//!
//! - 고정 크기 샘플 배열 (0으로 선초기화)
//! - 수신한 시퀀스 ID 집합 (중복 판별)
//! - 고유 프래그먼트 카운터 (완료 판정 기준)

use std::collections::HashSet;
use std::time::Instant;

use crate::packet::{Fragment, WindowId};

/// 프래그먼트 적용 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// 정상 적용됨
    Applied,

    /// 이미 받은 시퀀스 ID, 버퍼 변경 없음
    DuplicateIgnored,

    /// offset + length가 용량 초과, 버퍼 변경 없음
    OutOfRange,
}

/// 진행 중인 윈도우 하나의 재조립 버퍼
///
/// 수신하지 못한 위치는 0.0으로 남음 (silent-zero-fill 정책).
/// 완료 판정은 고유 프래그먼트 수 기준이므로 정당한 0.0 샘플과
/// 미수신 샘플이 혼동되지 않음
#[derive(Debug)]
pub struct WindowBuffer {
    /// 윈도우 ID
    pub window_id: WindowId,

    /// 샘플 버퍼 (길이 == 용량, 0으로 선초기화)
    samples: Vec<f32>,

    /// 수신한 시퀀스 ID 집합
    received_fragment_ids: HashSet<u32>,

    /// 고유 프래그먼트 수신 수
    fragments_received: u32,

    /// 생성 시간 (첫 프래그먼트 도착 시점)
    pub created_at: Instant,
}

impl WindowBuffer {
    /// 새 윈도우 버퍼 생성
    pub fn new(window_id: WindowId, capacity: usize) -> Self {
        Self {
            window_id,
            samples: vec![0.0; capacity],
            received_fragment_ids: HashSet::new(),
            fragments_received: 0,
            created_at: Instant::now(),
        }
    }

    /// 프래그먼트 적용
    ///
    /// 멱등: 같은 시퀀스 ID는 몇 번 와도 한 번만 반영됨.
    /// 가환: 적용 순서와 무관하게 동일한 최종 버퍼로 수렴함
    pub fn apply_fragment(&mut self, fragment: &Fragment) -> FragmentOutcome {
        if fragment.end_offset() > self.samples.len() {
            return FragmentOutcome::OutOfRange;
        }

        if self.received_fragment_ids.contains(&fragment.sequence_id) {
            return FragmentOutcome::DuplicateIgnored;
        }

        let offset = fragment.offset as usize;
        self.samples[offset..offset + fragment.samples.len()]
            .copy_from_slice(&fragment.samples);

        self.received_fragment_ids.insert(fragment.sequence_id);
        self.fragments_received += 1;

        FragmentOutcome::Applied
    }

    /// 완료 여부 확인 (고유 프래그먼트 수 기준)
    pub fn is_complete(&self, expected_fragments: usize) -> bool {
        self.fragments_received as usize >= expected_fragments
    }

    /// 고유 프래그먼트 수신 수
    pub fn fragments_received(&self) -> u32 {
        self.fragments_received
    }

    /// 수신률 계산 (0.0 ~ 1.0)
    pub fn receive_ratio(&self, expected_fragments: usize) -> f64 {
        if expected_fragments == 0 {
            return 0.0;
        }
        self.fragments_received as f64 / expected_fragments as f64
    }

    /// 샘플 읽기 전용 접근
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// 완료된 샘플 배열 추출
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
