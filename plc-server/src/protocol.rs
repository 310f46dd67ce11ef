//! Wire format: length-prefixed JSON frames carrying the two commands
//! spec'd for the network endpoint, `read` and `write`.
//!
//! Framing is a `u32` big-endian byte length followed by that many bytes of
//! JSON — chosen over a bare newline-delimited or raw-socket scheme because
//! PLC payloads are small but arbitrary JSON can itself contain newlines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use plc_core::Value;

use crate::error::ServerError;

/// Frames larger than this are refused rather than allocated; a
/// misbehaving or malicious peer gets a closed connection, not an OOM.
pub const MAX_FRAME_BYTES: u32 = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Read { keys: Vec<String> },
    Write { keyvalues: BTreeMap<String, Value> },
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    pub keyvalues: BTreeMap<String, Value>,
}

/// Reads one length-prefixed frame. Returns `Ok(None)` on a clean EOF at a
/// frame boundary (the peer closed the connection between requests).
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>, ServerError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(ServerError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ServerError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await.map_err(ServerError::Io)?;
    Ok(Some(body))
}

pub async fn write_frame<W>(stream: &mut W, body: &[u8]) -> Result<(), ServerError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len()).map_err(|_| ServerError::FrameTooLarge(u32::MAX))?;
    stream.write_all(&len.to_be_bytes()).await.map_err(ServerError::Io)?;
    stream.write_all(body).await.map_err(ServerError::Io)?;
    stream.flush().await.map_err(ServerError::Io)?;
    Ok(())
}

/// Parses a request frame into a `Command`, or `None` for anything
/// malformed/unrecognized — callers reply with `{}` rather than propagate
/// an error, per the "server never crashes the process" contract.
pub fn parse_command(body: &[u8]) -> Option<Command> {
    serde_json::from_slice(body).ok()
}

pub fn empty_reply() -> Vec<u8> {
    b"{}".to_vec()
}

pub fn read_reply(keyvalues: BTreeMap<String, Value>) -> Vec<u8> {
    serde_json::to_vec(&ReadResponse { keyvalues }).unwrap_or_else(|_| empty_reply())
}
