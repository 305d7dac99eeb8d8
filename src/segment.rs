//! 세그먼트와 와이어 프레임 정의
//!
//! 프레임 = 4바이트 빅엔디안 시퀀스 번호 + 페이로드
//! 길이 필드가 없으므로 페이로드 길이는 데이터그램 크기에서 헤더를 뺀 값

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// 시퀀스 번호 (32비트, 전송 단위로 단조 증가)
pub type SeqNum = u32;

/// 헤더 크기 (바이트)
pub const HEADER_SIZE: usize = 4;

/// 최대 페이로드 크기 (바이트)
pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// 최대 세그먼트 크기 (헤더 포함)
pub const MAX_SEGMENT_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// 세그먼트 (데이터 또는 ACK)
///
/// 데이터 세그먼트는 파일 바이트를, ACK 세그먼트는 빈 페이로드와
/// 다음에 기대하는 시퀀스 번호(누적)를 담는다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    seq_num: SeqNum,
    payload: Bytes,
}

impl Segment {
    /// 데이터 세그먼트 생성
    pub fn new(seq_num: SeqNum, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self { seq_num, payload })
    }

    /// ACK 세그먼트 생성
    pub fn ack(seq_num: SeqNum) -> Self {
        Self {
            seq_num,
            payload: Bytes::new(),
        }
    }

    pub fn seq_num(&self) -> SeqNum {
        self.seq_num
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 인코딩된 프레임 길이
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// 프레임으로 직렬화
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32(self.seq_num);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// 프레임에서 역직렬화
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::MalformedSegment {
                len: bytes.len(),
                reason: "헤더보다 짧음",
            });
        }
        if bytes.len() > MAX_SEGMENT_SIZE {
            return Err(Error::MalformedSegment {
                len: bytes.len(),
                reason: "최대 페이로드 초과",
            });
        }

        let seq_num = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Ok(Self {
            seq_num,
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..]),
        })
    }
}
