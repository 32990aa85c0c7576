//! Length-prefixed framing: `[u16 BE length][payload]`.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::observability;
use crate::kadm_protocol::SNIFFED_TAG_LEN;

/// Largest payload the 2-byte prefix can describe.
pub const MAX_WIRE_FRAME: usize = u16::MAX as usize;

/// Where the first frame of a connection starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// Nothing consumed yet.
    Fresh,
    /// The acceptor already read the length prefix and the first
    /// `SNIFFED_TAG_LEN` payload bytes.
    Resumed {
        declared_len: u16,
        consumed: [u8; SNIFFED_TAG_LEN],
    },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the stream mid-frame")]
    Closed,
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    Oversized { len: usize, max: usize },
    #[error("first frame declares {len} bytes, fewer than the sniffed tag")]
    ShortFirstFrame { len: usize },
}

fn closed_on_eof(err: io::Error) -> FrameError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        FrameError::Closed
    } else {
        FrameError::Io(err)
    }
}

/// Reads whole frames off a byte stream.
pub struct FrameReader<S> {
    stream: S,
    pending: FrameSource,
    max_frame_len: usize,
}

impl<S: AsyncRead + Unpin> FrameReader<S> {
    pub fn new(stream: S, source: FrameSource, max_frame_len: usize) -> Self {
        Self {
            stream,
            pending: source,
            max_frame_len: max_frame_len.min(MAX_WIRE_FRAME),
        }
    }

    /// Next complete payload, or `None` when the peer closed cleanly at a
    /// frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let (len, mut payload) = match std::mem::replace(&mut self.pending, FrameSource::Fresh) {
            FrameSource::Resumed {
                declared_len,
                consumed,
            } => {
                let len = usize::from(declared_len);
                if len < consumed.len() {
                    return Err(FrameError::ShortFirstFrame { len });
                }
                (len, consumed.to_vec())
            }
            FrameSource::Fresh => match self.read_prefix().await? {
                Some(len) => (len, Vec::new()),
                None => return Ok(None),
            },
        };

        if len > self.max_frame_len {
            return Err(FrameError::Oversized {
                len,
                max: self.max_frame_len,
            });
        }

        let already = payload.len();
        payload.resize(len, 0);
        self.stream
            .read_exact(&mut payload[already..])
            .await
            .map_err(closed_on_eof)?;

        observability::record_frame_received(len);
        Ok(Some(payload))
    }

    async fn read_prefix(&mut self) -> Result<Option<usize>, FrameError> {
        let mut prefix = [0u8; 2];
        let n = self.stream.read(&mut prefix).await?;
        match n {
            0 => return Ok(None),
            1 => {
                self.stream
                    .read_exact(&mut prefix[1..])
                    .await
                    .map_err(closed_on_eof)?;
            }
            _ => {}
        }
        Ok(Some(usize::from(u16::from_be_bytes(prefix))))
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

/// Writes one frame and flushes it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::Oversized {
        len: payload.len(),
        max: MAX_WIRE_FRAME,
    })?;

    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;

    observability::record_frame_sent(payload.len());
    Ok(())
}
