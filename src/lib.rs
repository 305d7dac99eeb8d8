//! # GBN-FTP
//!
//! UDP 기반 Go-Back-N 파일 송신기
//!
//! ## 핵심 특징
//! - **Go-Back-N ARQ**: 고정 크기 슬라이딩 윈도우, 누적 ACK
//! - **단일 재전송 타이머**: 타임아웃 시 윈도우 전체 재전송
//! - **TCP 제어 채널**: 파일 이름 협상과 종료 알림만 담당
//! - **배타 영역**: 송신 루프, ACK 리스너, 타이머가 하나의 잠금으로 윈도우 공유

pub mod chunk;
pub mod config;
pub mod control;
pub mod error;
pub mod listener;
pub mod segment;
pub mod sender;
pub mod session;
pub mod stats;
pub mod timer;
pub mod window;

pub use chunk::ChunkReader;
pub use config::Config;
pub use control::ControlChannel;
pub use error::{Error, Result};
pub use listener::AckListener;
pub use segment::{Segment, SeqNum, MAX_PAYLOAD_SIZE};
pub use sender::{Phase, Sender};
pub use session::Session;
pub use stats::TransferStats;
pub use timer::RetransmitTimer;
pub use window::Window;

/// 기본 윈도우 크기 (세그먼트)
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// 기본 재전송 타임아웃 (밀리초)
pub const DEFAULT_RTO_MS: u64 = 100;
