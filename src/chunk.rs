//! 파일 청크 읽기
//!
//! 파일을 `chunk_size` 크기의 연속 청크로 읽는다.
//! 마지막 청크를 제외하면 모든 청크는 정확히 `chunk_size` 바이트.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::Result;

/// 청크 단위 리더
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        Self {
            reader,
            chunk_size,
            eof: false,
        }
    }

    /// 다음 청크 (없으면 None)
    ///
    /// 짧은 읽기가 와도 EOF 전까지는 청크를 끝까지 채운다.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.eof {
            return Ok(None);
        }

        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;

        while filled < self.chunk_size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.eof = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }
}
