//! 재전송 타이머
//!
//! 전송당 하나만 존재하는 재무장 가능한 단발 타이머.
//! 만료 시 tokio 태스크에서 콜백을 실행하며, 콜백은 세대 번호를 받아
//! [`RetransmitTimer::claim`]으로 자신이 아직 유효한 타이머인지 확인해야 한다.
//! 취소와 만료가 경합해도 오래된 만료는 버려진다.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// 단발 재전송 타이머
#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    pending: Option<JoinHandle<()>>,
    generation: u64,
    enabled: bool,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: None,
            generation: 0,
            enabled: true,
        }
    }

    /// 만료 예약 여부
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// 기존 예약을 취소하고 `timeout` 후 `on_fire`를 실행하도록 예약
    ///
    /// 비활성화된 타이머는 무장되지 않는다.
    pub fn arm<F, Fut>(&mut self, on_fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        if !self.enabled {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let timeout = self.timeout;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            on_fire(generation).await;
        }));
        trace!("타이머 무장: generation={}, {:?}", generation, timeout);
    }

    /// 예약 취소 (이미 만료/취소된 경우 아무 것도 하지 않음)
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            trace!("타이머 취소: generation={}", self.generation);
        }
    }

    /// 만료 콜백이 호출
    ///
    /// `generation`이 현재 예약과 같으면 예약을 소비하고 true를 반환한다.
    /// 취소되었거나 재무장된 뒤 도착한 만료는 false.
    pub fn claim(&mut self, generation: u64) -> bool {
        if self.enabled && self.pending.is_some() && generation == self.generation {
            // 실행 중인 자기 자신이므로 abort 하지 않고 분리만 함
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// 취소 후 이후 무장 거부
    pub fn disable(&mut self) {
        self.cancel();
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Drop for RetransmitTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
