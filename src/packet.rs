//! 프래그먼트 정의와 와이어 코덱
//!
//! 센서 디바이스가 보내는 데이터그램 레이아웃 (little-endian 고정):
//!
//! ```text
//! offset 0  : u32 window_id      어느 윈도우 소속인지
//! offset 4  : u32 sequence_id    송신측 프래그먼트 일련번호
//! offset 8  : u32 offset         윈도우 내 샘플 시작 인덱스
//! offset 12 : u32 length         페이로드 샘플 수
//! offset 16 : f32[length]        IEEE-754 단정밀도 샘플
//! ```

use crate::error::{Error, Result};
use crate::HEADER_SIZE;

/// 윈도우 ID (32비트)
pub type WindowId = u32;

/// 데이터그램 하나에서 디코딩된 프래그먼트
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// 소속 윈도우 ID
    pub window_id: WindowId,

    /// 송신측 프래그먼트 일련번호 (중복 판별용, 배치에는 사용 안 함)
    pub sequence_id: u32,

    /// 윈도우 내 샘플 시작 인덱스
    pub offset: u32,

    /// 페이로드 샘플 수
    pub length: u32,

    /// 샘플 페이로드 (`length`개)
    pub samples: Vec<f32>,
}

impl Fragment {
    /// 새 프래그먼트 생성 (송신측/테스트용)
    pub fn new(window_id: WindowId, sequence_id: u32, offset: u32, samples: Vec<f32>) -> Self {
        Self {
            window_id,
            sequence_id,
            offset,
            length: samples.len() as u32,
            samples,
        }
    }

    /// 바이트에서 프래그먼트 디코딩
    ///
    /// 순수 함수. 선언된 페이로드 뒤의 잉여 바이트는 무시함
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::PacketTooShort {
                len: bytes.len(),
                min: HEADER_SIZE,
            });
        }

        let window_id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let sequence_id = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let offset = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let length = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        let expected = HEADER_SIZE + length as usize * 4;
        if bytes.len() < expected {
            return Err(Error::PacketSizeMismatch {
                expected,
                got: bytes.len(),
            });
        }

        let mut samples = Vec::with_capacity(length as usize);
        for i in 0..length as usize {
            let base = HEADER_SIZE + i * 4;
            samples.push(f32::from_le_bytes([
                bytes[base],
                bytes[base + 1],
                bytes[base + 2],
                bytes[base + 3],
            ]));
        }

        Ok(Self {
            window_id,
            sequence_id,
            offset,
            length,
            samples,
        })
    }

    /// 프래그먼트를 바이트로 인코딩 (디코딩과 대칭)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.samples.len() * 4);
        buf.extend_from_slice(&self.window_id.to_le_bytes());
        buf.extend_from_slice(&self.sequence_id.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&(self.samples.len() as u32).to_le_bytes());
        for sample in &self.samples {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
        buf
    }

    /// 페이로드 끝 샘플 인덱스 (`offset + length`)
    pub fn end_offset(&self) -> usize {
        self.offset as usize + self.length as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_roundtrip() {
        let fragment = Fragment::new(7, 3, 640, vec![1.5, -2.25, 0.0, 38.4]);
        let bytes = fragment.encode();

        assert_eq!(bytes.len(), 16 + 4 * 4);

        let decoded = Fragment::decode(&bytes).unwrap();
        assert_eq!(decoded, fragment);
        assert_eq!(decoded.end_offset(), 644);
    }

    #[test]
    fn test_decode_too_short() {
        let err = Fragment::decode(&[0u8; 15]).unwrap_err();
        assert!(matches!(err, Error::PacketTooShort { len: 15, min: 16 }));
    }

    #[test]
    fn test_decode_size_mismatch() {
        // 헤더는 샘플 8개를 선언하지만 페이로드는 4개뿐
        let mut bytes = Fragment::new(1, 0, 0, vec![0.0; 8]).encode();
        bytes.truncate(16 + 4 * 4);

        let err = Fragment::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::PacketSizeMismatch {
                expected: 48,
                got: 32
            }
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = Fragment::new(1, 0, 0, vec![1.0, 2.0]).encode();
        bytes.extend_from_slice(&[0xAB; 7]);

        let decoded = Fragment::decode(&bytes).unwrap();
        assert_eq!(decoded.samples, vec![1.0, 2.0]);
    }

    #[test]
    fn test_decode_empty_payload() {
        let bytes = Fragment::new(9, 1, 320, Vec::new()).encode();
        let decoded = Fragment::decode(&bytes).unwrap();
        assert_eq!(decoded.length, 0);
        assert!(decoded.samples.is_empty());
    }
}
