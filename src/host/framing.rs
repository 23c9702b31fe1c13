//! Message framing on the host's stdio pipes.

use crate::config::Framing;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Browsers refuse host-to-extension messages above 1 MiB.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;
/// Extension-to-host messages are capped at 64 MiB.
pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    Oversized { len: usize, limit: usize },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read the next frame. `Ok(None)` means the peer closed the pipe cleanly.
pub async fn read_frame<R>(
    reader: &mut R,
    framing: Framing,
) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    match framing {
        Framing::Lines => read_line(reader, MAX_INBOUND_BYTES).await,
        Framing::Native => {
            let mut header = [0u8; 4];
            match reader.read_exact(&mut header).await {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(err) => return Err(err.into()),
            }
            let len = u32::from_ne_bytes(header) as usize;
            if len > MAX_INBOUND_BYTES {
                return Err(FrameError::Oversized {
                    len,
                    limit: MAX_INBOUND_BYTES,
                });
            }
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload).await?;
            Ok(Some(payload))
        }
    }
}

/// Next non-blank line without its terminator. Reading stops `limit + 1`
/// bytes into a line, so an unterminated flood never sits in memory whole.
async fn read_line<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    loop {
        let mut line = Vec::new();
        if (&mut *reader).take(cap).read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') && line.len() > limit {
            return Err(FrameError::Oversized {
                len: line.len(),
                limit,
            });
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return Ok(Some(line));
    }
}

/// Write one frame and flush it.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    framing: Framing,
) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_OUTBOUND_BYTES {
        return Err(FrameError::Oversized {
            len: payload.len(),
            limit: MAX_OUTBOUND_BYTES,
        });
    }
    match framing {
        Framing::Lines => {
            writer.write_all(payload).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::Native => {
            let len = payload.len() as u32;
            writer.write_all(&len.to_ne_bytes()).await?;
            writer.write_all(payload).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
