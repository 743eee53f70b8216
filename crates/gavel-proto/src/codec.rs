//! Length-prefixed CBOR framing.
//!
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ len: u32 BE  │ CBOR payload (len bytes) │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! The decoder is incremental: it leaves partial frames in the buffer and
//! returns `Ok(None)` until the whole payload has arrived.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest accepted payload (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Append one framed message to `dst`.
pub fn encode_frame<T: Serialize>(message: &T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let mut payload = Vec::new();
    ciborium::into_writer(message, &mut payload)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: payload.len(), max: MAX_FRAME_SIZE });
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| ProtocolError::FrameTooLarge { size: payload.len(), max: MAX_FRAME_SIZE })?;

    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u32(len);
    dst.extend_from_slice(&payload);
    Ok(())
}

/// Take one message off the front of `src`, if a complete frame is buffered.
///
/// Oversized length prefixes are rejected before any payload is buffered.
pub fn decode_frame<T: DeserializeOwned>(src: &mut BytesMut) -> Result<Option<T>, ProtocolError> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size, max: MAX_FRAME_SIZE });
    }

    let total = LENGTH_PREFIX_SIZE + size;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let payload = src.split_to(size);
    ciborium::from_reader(payload.as_ref())
        .map(Some)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}

/// Read the next message from `reader`, buffering into `buf`.
///
/// Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R, T>(reader: &mut R, buf: &mut BytesMut) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    loop {
        if let Some(message) = decode_frame(buf)? {
            return Ok(Some(message));
        }

        if reader.read_buf(buf).await? == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(ProtocolError::Truncated { buffered: buf.len() })
            };
        }
    }
}

/// Write one framed message to `writer` and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = BytesMut::new();
    encode_frame(message, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
