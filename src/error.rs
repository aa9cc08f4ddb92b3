//! 에러 타입 정의

use thiserror::Error;

/// SWP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("패킷이 너무 짧음: {len} bytes (헤더 최소 {min} bytes)")]
    PacketTooShort { len: usize, min: usize },

    #[error("패킷 크기 불일치: expected {expected} bytes, got {got} bytes")]
    PacketSizeMismatch { expected: usize, got: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("싱크 종료됨")]
    SinkClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
