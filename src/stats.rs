//! 전송 통계

use std::time::{Duration, Instant};

/// 전체 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 최초 전송한 데이터 세그먼트 수
    pub segments_sent: u64,

    /// 최초 전송한 페이로드 바이트
    pub bytes_sent: u64,

    /// 재전송한 세그먼트 수
    pub retransmitted_segments: u64,

    /// 재전송 타이머 만료 횟수
    pub timeouts: u64,

    /// 수신한 ACK 수
    pub acks_received: u64,

    /// 무시된 ACK 수 (오래되었거나 중복)
    pub stale_acks: u64,

    /// ACK로 확인된 세그먼트 수
    pub acknowledged_segments: u64,

    /// 해석할 수 없는 데이터그램 수
    pub malformed_datagrams: u64,

    /// 데이터그램 송신 실패 수
    pub send_failures: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            segments_sent: 0,
            bytes_sent: 0,
            retransmitted_segments: 0,
            timeouts: 0,
            acks_received: 0,
            stale_acks: 0,
            acknowledged_segments: 0,
            malformed_datagrams: 0,
            send_failures: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 실효 처리율 (bytes/sec, 재전송 제외)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 / elapsed
    }

    /// 재전송 비율
    pub fn retransmission_ratio(&self) -> f64 {
        let total = self.segments_sent + self.retransmitted_segments;
        if total == 0 {
            return 0.0;
        }
        self.retransmitted_segments as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Segments: {} | Bytes: {} | Throughput: {:.2} MB/s | Retransmitted: {} ({:.1}%) | Timeouts: {} | ACKs: {}",
            self.elapsed().as_secs_f64(),
            self.segments_sent,
            self.bytes_sent,
            self.throughput() / 1_000_000.0,
            self.retransmitted_segments,
            self.retransmission_ratio() * 100.0,
            self.timeouts,
            self.acks_received,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
