//! 송신 세션
//!
//! 한 번의 파일 전송 동안 윈도우, 재전송 타이머, 다음 시퀀스 번호를
//! 하나의 배타 영역(`tokio::sync::Mutex`)으로 묶는다.
//! 송신 루프, ACK 리스너, 타이머 콜백 세 실행 흐름이 모두 이 영역을 통해서만
//! 상태에 접근한다.
//!
//! - 윈도우가 가득 차거나 빈 상태에서의 대기는 잠금을 놓고 `Notify`로 깨어남
//! - ACK 처리와 타임아웃 재전송은 본문 전체를 잠금 안에서 실행
//! - `close`는 타이머를 끄고 대기 중인 모든 호출자를 깨움

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tracing::{debug, trace, warn};

use crate::segment::{Segment, SeqNum};
use crate::stats::TransferStats;
use crate::timer::RetransmitTimer;
use crate::window::Window;
use crate::{Config, Error, Result};

/// 세션 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Shutdown,
    RetransmissionLimit { timeouts: u32 },
}

impl CloseReason {
    fn into_error(self) -> Error {
        match self {
            CloseReason::Shutdown => Error::Cancelled,
            CloseReason::RetransmissionLimit { timeouts } => {
                Error::RetransmissionLimit { timeouts }
            }
        }
    }
}

/// 배타 영역이 보호하는 상태
struct SessionState {
    window: Window,
    timer: RetransmitTimer,
    next_seq_num: SeqNum,
    consecutive_timeouts: u32,
    closed: Option<CloseReason>,
    stats: TransferStats,
}

impl SessionState {
    fn ensure_open(&self) -> Result<()> {
        match self.closed {
            Some(reason) => Err(reason.into_error()),
            None => Ok(()),
        }
    }
}

struct Inner {
    config: Config,
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    state: Mutex<SessionState>,
    not_full: Notify,
    not_empty: Notify,
    /// 잠금 밖에서 요청된 중단
    abandoned: AtomicBool,
}

/// Go-Back-N 송신 세션 핸들
///
/// 복제해서 리스너와 타이머 태스크에 넘긴다.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// 새 세션 생성
    ///
    /// `socket`으로 `peer_addr`에 데이터 세그먼트를 보낸다.
    pub fn new(config: Config, socket: Arc<UdpSocket>, peer_addr: SocketAddr) -> Self {
        let state = SessionState {
            window: Window::new(config.window_size),
            timer: RetransmitTimer::new(config.retransmission_timeout()),
            next_seq_num: 0,
            consecutive_timeouts: 0,
            closed: None,
            stats: TransferStats::new(),
        };

        Self {
            inner: Arc::new(Inner {
                config,
                socket,
                peer_addr,
                state: Mutex::new(state),
                not_full: Notify::new(),
                not_empty: Notify::new(),
                abandoned: AtomicBool::new(false),
            }),
        }
    }

    /// 다음 시퀀스 번호로 데이터 세그먼트 생성
    pub async fn next_segment(&self, payload: Bytes) -> Result<Segment> {
        let mut state = self.inner.state.lock().await;
        state.ensure_open()?;

        let seq_num = state.next_seq_num;
        let segment = Segment::new(seq_num, payload)?;
        state.next_seq_num = seq_num
            .checked_add(1)
            .ok_or(Error::SequenceSpaceExhausted)?;
        Ok(segment)
    }

    /// 윈도우 tail에 추가 (가득 차면 대기)
    pub async fn push(&self, segment: Segment) -> Result<()> {
        let mut state = self.lock_with_room().await?;
        self.push_locked(&mut state, segment)
    }

    /// 윈도우 head 제거 (비어 있으면 대기)
    pub async fn pop(&self) -> Result<Segment> {
        loop {
            let notified = self.inner.not_empty.notified();
            let mut state = self.inner.state.lock().await;
            state.ensure_open()?;

            if let Some(segment) = self.pop_locked(&mut state) {
                return Ok(segment);
            }

            drop(state);
            notified.await;
        }
    }

    pub async fn peek_head(&self) -> Option<Segment> {
        self.inner.state.lock().await.window.peek_head().cloned()
    }

    pub async fn snapshot(&self) -> Vec<Segment> {
        self.inner.state.lock().await.window.snapshot()
    }

    pub async fn size(&self) -> usize {
        self.inner.state.lock().await.window.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.lock().await.window.is_empty()
    }

    pub async fn is_full(&self) -> bool {
        self.inner.state.lock().await.window.is_full()
    }

    /// 재전송 타이머 무장 여부
    pub async fn timer_armed(&self) -> bool {
        self.inner.state.lock().await.timer.is_armed()
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed.is_some()
    }

    /// 통계 반환
    pub async fn stats(&self) -> TransferStats {
        self.inner.state.lock().await.stats.clone()
    }

    /// 해석 불가 데이터그램 기록
    pub async fn record_malformed(&self) {
        self.inner.state.lock().await.stats.malformed_datagrams += 1;
    }

    /// 송신 단계
    ///
    /// 윈도우에 자리가 날 때까지 기다린 뒤, 잠금을 쥔 채로 윈도우에 넣고
    /// 데이터그램을 보낸다. 넣기 직전 윈도우가 비어 있었으면 타이머를 무장한다.
    /// 송신 호출 실패는 기록만 하고 재전송 타이머에 맡긴다.
    pub async fn transmit(&self, segment: Segment) -> Result<()> {
        let mut state = self.lock_with_room().await?;
        let was_empty = state.window.is_empty();

        self.push_locked(&mut state, segment.clone())?;
        self.send_datagram(&mut state, &segment).await;

        state.stats.segments_sent += 1;
        state.stats.bytes_sent += segment.payload().len() as u64;

        if was_empty {
            self.arm_timer(&mut state);
        }

        trace!("세그먼트 {} 전송, in-flight={}", segment.seq_num(), state.window.len());
        Ok(())
    }

    /// 누적 ACK 처리
    ///
    /// `ack`보다 작은 시퀀스 번호의 세그먼트를 모두 제거하고 제거한 개수를 반환한다.
    /// 윈도우가 비었거나 `ack`이 head 이하이면 아무 것도 하지 않는다.
    pub async fn on_ack(&self, ack: &Segment) -> usize {
        let mut state = self.inner.state.lock().await;
        if self.close_if_abandoned(&mut state) || state.closed.is_some() {
            return 0;
        }
        state.stats.acks_received += 1;

        let ack_num = ack.seq_num();
        let head = match state.window.head_seq_num() {
            Some(head) if ack_num > head => head,
            _ => {
                state.stats.stale_acks += 1;
                trace!("ACK {} 무시", ack_num);
                return 0;
            }
        };

        state.timer.cancel();

        let mut acked = 0;
        while state.window.head_seq_num().is_some_and(|seq| seq < ack_num) {
            self.pop_locked(&mut state);
            acked += 1;
        }

        state.stats.acknowledged_segments += acked as u64;
        state.consecutive_timeouts = 0;

        if !state.window.is_empty() {
            self.arm_timer(&mut state);
        }

        debug!(
            "ACK {}: {}..{} 확인, in-flight={}",
            ack_num,
            head,
            ack_num,
            state.window.len()
        );
        acked
    }

    /// 타임아웃 처리
    ///
    /// 윈도우 전체를 오래된 순으로 그대로 재전송하고 재전송 개수를 반환한다.
    pub async fn handle_timeout(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        if state.closed.is_some() {
            return 0;
        }
        self.retransmit_locked(&mut state).await
    }

    /// 윈도우가 빌 때까지 대기
    pub async fn drain(&self) -> Result<()> {
        loop {
            let notified = self.inner.not_full.notified();
            let state = self.inner.state.lock().await;
            state.ensure_open()?;

            if state.window.is_empty() {
                return Ok(());
            }

            drop(state);
            notified.await;
        }
    }

    /// 세션 종료
    ///
    /// 타이머를 끄고 `push`/`pop`/`drain` 대기자를 모두 깨운다.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        self.close_locked(&mut state, CloseReason::Shutdown);
    }

    /// 동기 중단
    ///
    /// `Drop`에서 부를 수 있도록 기다리지 않는다. 잠금을 바로 얻으면 즉시 닫고,
    /// 아니면 중단 표시만 남긴다. 표시가 남은 세션은 다음 타이머 만료나
    /// ACK 처리에서 아무것도 보내지 않고 닫힌다.
    pub fn abandon(&self) {
        self.inner.abandoned.store(true, Ordering::Release);
        if let Ok(mut state) = self.inner.state.try_lock() {
            self.close_locked(&mut state, CloseReason::Shutdown);
        }
    }

    fn close_if_abandoned(&self, state: &mut SessionState) -> bool {
        if !self.inner.abandoned.load(Ordering::Acquire) {
            return false;
        }
        self.close_locked(state, CloseReason::Shutdown);
        true
    }

    async fn lock_with_room(&self) -> Result<MutexGuard<'_, SessionState>> {
        loop {
            let notified = self.inner.not_full.notified();
            let state = self.inner.state.lock().await;
            state.ensure_open()?;

            if !state.window.is_full() {
                return Ok(state);
            }

            drop(state);
            notified.await;
        }
    }

    fn push_locked(&self, state: &mut SessionState, segment: Segment) -> Result<()> {
        state.window.push(segment)?;
        self.inner.not_empty.notify_waiters();
        Ok(())
    }

    fn pop_locked(&self, state: &mut SessionState) -> Option<Segment> {
        let segment = state.window.pop();
        if segment.is_some() {
            self.inner.not_full.notify_waiters();
        }
        segment
    }

    fn close_locked(&self, state: &mut SessionState, reason: CloseReason) {
        if state.closed.is_none() {
            state.closed = Some(reason);
        }
        state.timer.disable();
        self.inner.not_full.notify_waiters();
        self.inner.not_empty.notify_waiters();
    }

    fn arm_timer(&self, state: &mut SessionState) {
        let session = self.clone();
        state
            .timer
            .arm(move |generation| async move { session.on_timer_fired(generation).await });
    }

    async fn on_timer_fired(&self, generation: u64) {
        let mut state = self.inner.state.lock().await;
        if !state.timer.claim(generation) {
            return;
        }
        if self.close_if_abandoned(&mut state) {
            debug!("중단된 세션, 재전송 생략");
            return;
        }

        state.stats.timeouts += 1;
        state.consecutive_timeouts += 1;

        if let Some(limit) = self.inner.config.max_consecutive_timeouts {
            if state.consecutive_timeouts > limit {
                let timeouts = state.consecutive_timeouts;
                warn!("연속 타임아웃 {}회, 전송 중단", timeouts);
                self.close_locked(&mut state, CloseReason::RetransmissionLimit { timeouts });
                return;
            }
        }

        let count = self.retransmit_locked(&mut state).await;
        debug!("타임아웃: {}개 세그먼트 재전송", count);
    }

    async fn retransmit_locked(&self, state: &mut SessionState) -> usize {
        let segments = state.window.snapshot();
        for segment in &segments {
            self.send_datagram(state, segment).await;
        }
        state.stats.retransmitted_segments += segments.len() as u64;

        if !state.window.is_empty() {
            self.arm_timer(state);
        }
        segments.len()
    }

    async fn send_datagram(&self, state: &mut SessionState, segment: &Segment) {
        let frame = segment.encode();
        if let Err(e) = self.inner.socket.send_to(&frame, self.inner.peer_addr).await {
            state.stats.send_failures += 1;
            warn!(
                "세그먼트 {} {}",
                segment.seq_num(),
                Error::TransportSendFailed(e)
            );
        }
    }
}
