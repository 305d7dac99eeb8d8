//! 전송 윈도우
//!
//! 전송했지만 아직 ACK 받지 못한 세그먼트의 FIFO.
//! 재전송 대상 집합이면서 송신자가 수신자보다 앞서 나갈 수 있는 한도이기도 하다.
//! 잠금은 하지 않으며 [`crate::session::Session`]이 배타 영역 안에서만 접근한다.

use std::collections::VecDeque;

use crate::segment::{SeqNum, Segment};
use crate::{Error, Result};

/// 용량 제한 송신 윈도우
#[derive(Debug)]
pub struct Window {
    capacity: usize,
    segments: VecDeque<Segment>,
}

impl Window {
    /// 세그먼트 단위 용량으로 생성
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1, "window capacity must be at least 1");
        Self {
            capacity,
            segments: VecDeque::with_capacity(capacity),
        }
    }

    /// tail에 추가
    ///
    /// 가득 찼거나 시퀀스 번호가 tail보다 크지 않으면 실패한다.
    pub fn push(&mut self, segment: Segment) -> Result<()> {
        if self.is_full() {
            return Err(Error::WindowFull {
                capacity: self.capacity,
            });
        }
        if let Some(tail) = self.segments.back() {
            if segment.seq_num() <= tail.seq_num() {
                return Err(Error::OutOfOrderSegment {
                    seq_num: segment.seq_num(),
                    tail: tail.seq_num(),
                });
            }
        }

        self.segments.push_back(segment);
        Ok(())
    }

    /// head 제거
    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop_front()
    }

    /// 가장 오래된 미확인 세그먼트
    pub fn peek_head(&self) -> Option<&Segment> {
        self.segments.front()
    }

    /// head의 시퀀스 번호
    pub fn head_seq_num(&self) -> Option<SeqNum> {
        self.segments.front().map(Segment::seq_num)
    }

    /// 현재 세그먼트 복사본 (오래된 순)
    pub fn snapshot(&self) -> Vec<Segment> {
        self.segments.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.segments.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
