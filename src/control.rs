//! 제어 채널 (TCP)
//!
//! 전송 협상에만 사용한다.
//! 1. 송신자 → 수신자: 파일 이름 (u16 빅엔디안 길이 + modified UTF-8)
//! 2. 수신자 → 송신자: 1바이트, 0이면 준비 완료
//! 3. 전송 종료 시 송신자 → 수신자: 1바이트 0

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::{Error, Result};

/// 준비 완료 / 전송 종료 코드
pub const READY: u8 = 0;
pub const END_OF_TRANSFER: u8 = 0;

/// 송신자 측 제어 채널
pub struct ControlChannel {
    stream: TcpStream,
}

impl ControlChannel {
    /// 수신자에 연결
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(Error::HandshakeFailed)?;
        stream.set_nodelay(true).map_err(Error::HandshakeFailed)?;

        Ok(Self { stream })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// 파일 이름을 보내고 준비 응답을 기다림
    pub async fn request_transfer(&mut self, file_name: &str) -> Result<()> {
        let frame = encode_utf(file_name)?;

        self.stream
            .write_all(&frame)
            .await
            .map_err(Error::HandshakeFailed)?;
        self.stream.flush().await.map_err(Error::HandshakeFailed)?;
        debug!("파일 이름 전송: {:?}", file_name);

        let code = self.stream.read_u8().await.map_err(Error::HandshakeFailed)?;
        if code != READY {
            return Err(Error::HandshakeRejected { code });
        }

        info!("수신자 준비 완료: {}", self.peer_addr()?);
        Ok(())
    }

    /// 전송 종료 알림 후 채널 닫기
    pub async fn finish(mut self) -> Result<()> {
        self.stream
            .write_u8(END_OF_TRANSFER)
            .await
            .map_err(Error::TransportSendFailed)?;
        self.stream
            .flush()
            .await
            .map_err(Error::TransportSendFailed)?;
        self.stream
            .shutdown()
            .await
            .map_err(Error::TransportSendFailed)?;
        Ok(())
    }
}

/// 길이 접두 modified UTF-8 인코딩
///
/// UTF-16 코드 유닛 단위로 인코딩하므로 NUL은 2바이트, 보충 평면 문자는
/// 서로게이트 쌍 각각 3바이트가 된다.
pub fn encode_utf(s: &str) -> Result<Bytes> {
    let mut body = BytesMut::with_capacity(s.len());

    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => body.put_u8(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                body.put_u8(0xC0 | (unit >> 6) as u8);
                body.put_u8(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                body.put_u8(0xE0 | (unit >> 12) as u8);
                body.put_u8(0x80 | ((unit >> 6) & 0x3F) as u8);
                body.put_u8(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    let len = u16::try_from(body.len()).map_err(|_| Error::FileNameTooLong { len: body.len() })?;

    let mut frame = BytesMut::with_capacity(2 + body.len());
    frame.put_u16(len);
    frame.put_slice(&body);
    Ok(frame.freeze())
}
