//! 에러 타입 정의

use thiserror::Error;

/// GBN-FTP 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("핸드셰이크 실패: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    #[error("수신자가 전송을 거부함: code={code}")]
    HandshakeRejected { code: u8 },

    #[error("잘못된 세그먼트: {len} bytes ({reason})")]
    MalformedSegment { len: usize, reason: &'static str },

    #[error("페이로드 크기 초과: {len} > {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("전송 실패: {0}")]
    TransportSendFailed(#[source] std::io::Error),

    #[error("윈도우 가득 참: capacity={capacity}")]
    WindowFull { capacity: usize },

    #[error("순서가 어긋난 세그먼트: seq={seq_num}, tail={tail}")]
    OutOfOrderSegment { seq_num: u32, tail: u32 },

    #[error("시퀀스 번호 공간 소진")]
    SequenceSpaceExhausted,

    #[error("재전송 한도 초과: 연속 타임아웃 {timeouts}회")]
    RetransmissionLimit { timeouts: u32 },

    #[error("파일 이름이 너무 김: {len} bytes (최대 65535)")]
    FileNameTooLong { len: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("전송 취소됨")]
    Cancelled,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
