//! 전송 설정

use std::time::Duration;

use crate::{Error, Result, DEFAULT_RTO_MS, DEFAULT_WINDOW_SIZE};

/// GBN 송신자 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 윈도우 크기 (세그먼트 수, 바이트 아님)
    pub window_size: usize,

    /// 재전송 타임아웃 (밀리초)
    pub retransmission_timeout_ms: u64,

    /// 연속 타임아웃 허용 횟수
    /// None이면 윈도우가 빌 때까지 무한 재전송
    pub max_consecutive_timeouts: Option<u32>,

    /// ACK 수신 버퍼 크기 (바이트)
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            retransmission_timeout_ms: DEFAULT_RTO_MS,
            max_consecutive_timeouts: None,
            recv_buffer_size: 65535,
        }
    }
}

impl Config {
    /// 윈도우 크기와 타임아웃으로 설정 생성
    pub fn new(window_size: usize, retransmission_timeout_ms: u64) -> Self {
        Self {
            window_size,
            retransmission_timeout_ms,
            ..Self::default()
        }
    }

    /// 재전송 타임아웃
    pub fn retransmission_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmission_timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상이어야 함".into()));
        }
        if self.retransmission_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "retransmission_timeout_ms는 1 이상이어야 함".into(),
            ));
        }
        if self.max_consecutive_timeouts == Some(0) {
            return Err(Error::InvalidConfig(
                "max_consecutive_timeouts는 1 이상이어야 함".into(),
            ));
        }
        if self.recv_buffer_size < crate::segment::HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "recv_buffer_size가 헤더 크기({})보다 작음",
                crate::segment::HEADER_SIZE
            )));
        }
        Ok(())
    }

    /// 로컬 네트워크용 설정
    pub fn lan() -> Self {
        Self {
            window_size: 32,
            retransmission_timeout_ms: 50,
            max_consecutive_timeouts: None,
            recv_buffer_size: 65535,
        }
    }

    /// 손실이 많은 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            window_size: 8,
            retransmission_timeout_ms: 300,
            max_consecutive_timeouts: Some(50), // 약 15초 무응답 시 포기
            recv_buffer_size: 65535,
        }
    }
}
