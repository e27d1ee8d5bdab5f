//! Per-connection stream readers.
//!
//! # Wire Formats
//! ```text
//! statsd over TCP:   <line>\n<line>\n...
//! SSF over streams:  [version: u8 = 0][length: u32 BE][payload; length bytes] ...
//! ```

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::intake::PacketHandler;
use crate::observability::metrics;

/// Only defined SSF frame version.
pub const SSF_FRAME_VERSION: u8 = 0;

/// Error type for stream reading.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    #[error("unknown frame version {0}")]
    Version(u8),

    #[error("frame of {len} bytes exceeds maximum of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("connection closed in the middle of a frame")]
    Truncated,

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Hand every newline-terminated line to the handler until EOF.
///
/// A trailing unterminated line at EOF is still delivered. Returns the
/// number of lines read.
pub async fn read_statsd_lines<S>(stream: S, max_len: usize, handler: &dyn PacketHandler) -> Result<u64, FrameError>
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(max_len.min(8192));
    let mut count = 0u64;

    loop {
        line.clear();
        let n = (&mut reader).take(max_len as u64 + 1).read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(count);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.len() > max_len {
            metrics::record_oversize_packet("metric");
            return Err(FrameError::LineTooLong { max: max_len });
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.is_empty() {
            handler.handle_metric_packet(&line);
            count += 1;
        }
    }
}

/// Read one SSF frame. `Ok(None)` on a clean EOF between frames.
pub async fn read_ssf_frame<S>(stream: &mut S, max_len: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    S: AsyncRead + Unpin,
{
    let version = match stream.read_u8().await {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if version != SSF_FRAME_VERSION {
        return Err(FrameError::Version(version));
    }

    let len = stream.read_u32().await.map_err(truncated)? as usize;
    if len > max_len {
        metrics::record_oversize_packet("trace");
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut payload = vec![0; len];
    stream.read_exact(&mut payload).await.map_err(truncated)?;
    Ok(Some(payload))
}

/// Hand every SSF frame to the handler until EOF. Returns the frame count.
pub async fn read_ssf_frames<S>(stream: S, max_len: usize, handler: &dyn PacketHandler) -> Result<u64, FrameError>
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut count = 0u64;
    while let Some(frame) = read_ssf_frame(&mut reader, max_len).await? {
        handler.handle_trace_packet(&frame);
        count += 1;
    }
    Ok(count)
}

fn truncated(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::Truncated
    } else {
        FrameError::Io(e)
    }
}
