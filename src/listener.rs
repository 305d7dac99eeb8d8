//! ACK 리스너
//!
//! 데이터그램 소켓에서 ACK를 받아 세션의 누적 ACK 처리로 넘기는 백그라운드 태스크.
//! 종료 신호(`watch`)와 수신을 `select!`로 경합시켜 블로킹 수신에 갇히지 않는다.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::segment::Segment;
use crate::session::Session;

/// 실행 중인 ACK 리스너 핸들
pub struct AckListener {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AckListener {
    /// 리스너 태스크 시작
    pub fn spawn(socket: Arc<UdpSocket>, session: Session, buffer_size: usize) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(socket, session, buffer_size, shutdown_rx));

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// 종료 신호를 보내고 태스크가 끝날 때까지 대기
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!("ACK 리스너 종료 에러: {}", e);
        }
    }

    /// 기다리지 않고 즉시 중단
    ///
    /// 종료 신호를 보내고 태스크를 취소한다. `Drop`에서 사용.
    pub fn abort(&self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run(
    socket: Arc<UdpSocket>,
    session: Session,
    buffer_size: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; buffer_size];

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,

            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, addr)) => match Segment::decode(&buf[..len]) {
                        Ok(ack) => {
                            trace!("ACK {} 수신 from {}", ack.seq_num(), addr);
                            session.on_ack(&ack).await;
                        }
                        Err(e) => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                            warn!("데이터그램 무시 ({}): {}", addr, e);
                            session.record_malformed().await;
                        }
                    },
                    Err(e) => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        warn!("수신 에러: {}", e);
                    }
                }
            }
        }
    }

    debug!("ACK 리스너 종료");
}
