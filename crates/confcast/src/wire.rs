use crate::store::{Item, Metrics};
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame body.
pub const MAX_FRAME: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the limit")]
    Oversize(usize),
}

/// One request on the cache service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Get { key: String },
    Put { item: Item },
    Bulk { items: Vec<Item> },
    Delete { key: String },
    Clear,
    Stats,
}

/// The reply to a [`Request`]. `NotFound` is a domain miss, not a
/// transport failure, and crosses the wire as its own variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Item(Item),
    Ack(bool),
    Metrics(Metrics),
    NotFound,
}

/// Write one length-prefixed message: a u32 big-endian body length
/// followed by the JSON body, flushed as a single buffer.
pub async fn write_frame<T, W>(writer: &mut W, msg: &T) -> Result<(), WireError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME {
        return Err(WireError::Oversize(body.len()));
    }
    let mut frame = BytesMut::with_capacity(4 + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(&body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message.
///
/// Returns `Ok(None)` on a clean close before the length prefix; an EOF in
/// the middle of a frame is an error.
pub async fn read_frame<T, R>(reader: &mut R) -> Result<Option<T>, WireError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME {
        return Err(WireError::Oversize(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}
