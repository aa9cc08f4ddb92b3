//! # SWP (Sensor Window Protocol)
//!
//! UDP 기반 센서 수집 윈도우 재조립 엔진
//!
//! ## 핵심 특징
//! - **순수 수신형**: ACK/NACK 없음, 재전송 요청 없음 (센서는 단방향 송신)
//! - **윈도우 조립**: 프래그먼트를 오프셋 기준으로 퍼즐처럼 조립
//! - **순서 무관**: 도착 순서와 무관하게 동일한 최종 윈도우로 수렴
//! - **중복 허용**: 시퀀스 ID 기반 멱등 적용, 완료 카운트 오염 없음
//! - **메모리 상한**: 동시 윈도우 수 제한, 가장 오래된 윈도우부터 축출
//! - **백프레셔**: 완료 윈도우는 유한 큐로 전달, 수신 루프는 절대 블록 안 됨

pub mod config;
pub mod error;
pub mod listener;
pub mod packet;
pub mod reassembler;
pub mod sink;
pub mod stats;
pub mod window;

pub use config::Config;
pub use error::{Error, Result};
pub use listener::Listener;
pub use packet::Fragment;
pub use reassembler::{CompletedWindow, WindowReassembler};
pub use sink::{LogSink, WindowReceiver, WindowSink};
pub use stats::{ReassemblyStats, StatsSnapshot};
pub use window::{FragmentOutcome, WindowBuffer};

/// 프래그먼트 헤더 크기 (바이트)
///
/// `[windowId:u32][sequenceId:u32][offset:u32][length:u32]` little-endian
pub const HEADER_SIZE: usize = 16;

/// 기본 윈도우 용량 (샘플 수, 38.4kHz × 1초)
pub const DEFAULT_WINDOW_CAPACITY: usize = 38_400;

/// 기본 프래그먼트당 샘플 수
pub const DEFAULT_SAMPLES_PER_FRAGMENT: usize = 320;

/// 기본 윈도우당 예상 프래그먼트 수 (38400 / 320)
pub const DEFAULT_EXPECTED_FRAGMENTS: usize = 120;

/// 기본 샘플링 주파수 (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 38_400;

/// UDP 데이터그램 최대 크기
pub const MAX_DATAGRAM_SIZE: usize = 65_535;
