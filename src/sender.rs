//! 송신자 (Go-Back-N 엔진)
//!
//! - TCP 제어 채널로 파일 이름 협상
//! - 파일을 세그먼트로 나눠 UDP로 전송, 윈도우가 차면 대기
//! - 누적 ACK / 단일 재전송 타이머로 신뢰성 확보
//! - 윈도우가 비면 제어 채널로 종료 알림

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::fs::File;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::chunk::ChunkReader;
use crate::control::ControlChannel;
use crate::listener::AckListener;
use crate::segment::MAX_PAYLOAD_SIZE;
use crate::session::Session;
use crate::stats::TransferStats;
use crate::{Config, Result};

/// 전송 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Handshaking,
    Transmitting,
    Draining,
    Completing,
    Closed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Handshaking => "handshaking",
            Phase::Transmitting => "transmitting",
            Phase::Draining => "draining",
            Phase::Completing => "completing",
            Phase::Closed => "closed",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 파일 송신자
pub struct Sender {
    /// 설정
    config: Config,

    /// 현재 단계
    phase: RwLock<Phase>,

    /// 마지막 전송 통계
    last_stats: RwLock<Option<TransferStats>>,
}

impl Sender {
    /// 새 송신자 생성
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: RwLock::new(Phase::Idle),
            last_stats: RwLock::new(None),
        }
    }

    /// 윈도우 크기(세그먼트)와 재전송 타임아웃(ms)으로 생성
    pub fn with_window(window_size: usize, retransmission_timeout_ms: u64) -> Self {
        Self::new(Config::new(window_size, retransmission_timeout_ms))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 현재 단계
    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    /// 마지막 전송의 통계 (실패한 전송 포함)
    pub fn last_stats(&self) -> Option<TransferStats> {
        self.last_stats.read().clone()
    }

    /// 파일 전송
    ///
    /// 핸드셰이크부터 종료 알림까지 끝나면 반환한다.
    /// 실패한 전송은 재개할 수 없으며 처음부터 다시 보내야 한다.
    pub async fn send(
        &self,
        server_name: &str,
        server_port: u16,
        file_path: impl AsRef<Path>,
    ) -> Result<TransferStats> {
        let file_path = file_path.as_ref();
        let result = self.run(server_name, server_port, file_path).await;

        match &result {
            Ok(stats) => {
                self.set_phase(Phase::Closed);
                info!("전송 완료: {}", stats.summary());
            }
            Err(e) => {
                self.set_phase(Phase::Failed);
                error!("전송 실패 ({}): {}", file_path.display(), e);
            }
        }

        result
    }

    async fn run(&self, server_name: &str, server_port: u16, file_path: &Path) -> Result<TransferStats> {
        self.config.validate()?;
        *self.last_stats.write() = None;

        let file = File::open(file_path).await?;
        let mut chunks = ChunkReader::new(file, MAX_PAYLOAD_SIZE);

        // 핸드셰이크
        self.set_phase(Phase::Handshaking);
        let mut control = ControlChannel::connect((server_name, server_port)).await?;
        control
            .request_transfer(&file_path.to_string_lossy())
            .await?;

        // 데이터 채널은 제어 채널과 같은 로컬 포트 사용
        self.set_phase(Phase::Transmitting);
        let socket = Arc::new(UdpSocket::bind(control.local_addr()?).await?);
        let peer_addr = control.peer_addr()?;
        info!(
            "데이터 채널: {} -> {}",
            socket.local_addr()?,
            peer_addr
        );

        let session = Session::new(self.config.clone(), socket.clone(), peer_addr);
        let listener = AckListener::spawn(socket, session.clone(), self.config.recv_buffer_size);
        let transfer = TransferGuard::new(session, listener);

        let outcome = self.transmit_file(&transfer.session, &mut chunks).await;

        // 성공/실패 모두 리스너와 타이머를 정리하고 데이터 소켓을 닫음
        let stats = transfer.finish().await;
        *self.last_stats.write() = Some(stats.clone());
        outcome?;

        self.set_phase(Phase::Completing);
        control.finish().await?;
        debug!("종료 알림 전송");

        Ok(stats)
    }

    async fn transmit_file<R>(&self, session: &Session, chunks: &mut ChunkReader<R>) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        while let Some(payload) = chunks.next_chunk().await? {
            let segment = session.next_segment(payload).await?;
            session.transmit(segment).await?;
        }

        self.set_phase(Phase::Draining);
        session.drain().await
    }

    fn set_phase(&self, phase: Phase) {
        let previous = std::mem::replace(&mut *self.phase.write(), phase);
        if previous != phase {
            debug!("단계 전환: {} -> {}", previous, phase);
        }
    }
}

/// 전송 단계 자원 가드
///
/// `send` future가 도중에 버려져도 ACK 리스너와 재전송 타이머가 남지 않게 한다.
struct TransferGuard {
    session: Session,
    listener: Option<AckListener>,
}

impl TransferGuard {
    fn new(session: Session, listener: AckListener) -> Self {
        Self {
            session,
            listener: Some(listener),
        }
    }

    /// 리스너를 멈추고 세션을 닫은 뒤 통계 반환
    ///
    /// 가드가 소비되면서 세션이 쥔 데이터 소켓도 함께 해제된다.
    async fn finish(mut self) -> TransferStats {
        if let Some(listener) = self.listener.take() {
            listener.shutdown().await;
        }
        self.session.close().await;
        self.session.stats().await
    }
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            debug!("전송 중단: 리스너와 타이머 정리");
            listener.abort();
        }
        self.session.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;
    use crate::Error;

    #[test]
    fn test_new_sender_is_idle() {
        let sender = Sender::with_window(4, 100);
        assert_eq!(sender.phase(), Phase::Idle);
        assert_eq!(sender.config().window_size, 4);
        assert!(sender.last_stats().is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_network() {
        let sender = Sender::with_window(0, 100);
        let result = sender.send("127.0.0.1", 9, "Cargo.toml").await;

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(sender.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_handshake() {
        let sender = Sender::with_window(4, 100);
        let result = sender
            .send("127.0.0.1", 9, "/nonexistent/definitely-missing.bin")
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(sender.phase(), Phase::Failed);
    }

    #[tokio::test]
    async fn test_dropped_transfer_guard_stops_timer_and_listener() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let session = Session::new(Config::new(4, 20), socket.clone(), peer.local_addr().unwrap());
        let listener = AckListener::spawn(socket, session.clone(), 2048);

        session
            .transmit(Segment::new(0, vec![1u8]).unwrap())
            .await
            .unwrap();
        assert!(session.timer_armed().await);

        drop(TransferGuard::new(session.clone(), listener));

        assert!(session.is_closed().await);
        assert!(!session.timer_armed().await);
        assert!(matches!(session.drain().await, Err(Error::Cancelled)));
    }
}
