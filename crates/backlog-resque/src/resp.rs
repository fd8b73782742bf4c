//! RESP2 framing.
//!
//! ```text
//! Client → Server (array of bulk strings):
//!   *2\r\n$4\r\nLLEN\r\n$14\r\nresque:queue:a\r\n
//!
//! Server → Client:
//!   +OK\r\n                 simple string
//!   -ERR message\r\n        error
//!   :42\r\n                 integer
//!   $5\r\nhello\r\n         bulk string ($-1\r\n is null)
//!   *2\r\n...               array of any of the above (*-1\r\n is null)
//! ```

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use backlog_core::BoxFuture;

use crate::error::{RespError, RespResult};

/// Largest bulk string Redis will ever send (512 MiB).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<RespValue>>),
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::Simple(s) => write!(f, "+{s}"),
            RespValue::Error(e) => write!(f, "-{e}"),
            RespValue::Integer(n) => write!(f, ":{n}"),
            RespValue::Bulk(None) => f.write_str("(nil)"),
            RespValue::Bulk(Some(b)) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            RespValue::Array(None) => f.write_str("(nil array)"),
            RespValue::Array(Some(items)) => write!(f, "array of {}", items.len()),
        }
    }
}

/// Encode a command as a RESP array of bulk strings.
///
/// e.g. `encode_command(&["GET", "user:1"])` → `*2\r\n$3\r\nGET\r\n$6\r\nuser:1\r\n`
pub fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + parts.iter().map(|p| p.len() + 16).sum::<usize>());
    buf.push(b'*');
    buf.extend_from_slice(parts.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for part in parts {
        buf.push(b'$');
        buf.extend_from_slice(part.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(part.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Read one complete reply from `reader`.
pub fn read_value<'a, R>(reader: &'a mut R) -> BoxFuture<'a, RespResult<RespValue>>
where
    R: AsyncBufRead + Unpin + Send,
{
    Box::pin(async move {
        let line = read_line(reader).await?;
        let Some((&tag, rest)) = line.split_first() else {
            return Err(RespError::Protocol("empty reply line".to_string()));
        };

        match tag {
            b'+' => Ok(RespValue::Simple(utf8(rest)?)),
            b'-' => Ok(RespValue::Error(utf8(rest)?)),
            b':' => Ok(RespValue::Integer(parse_int(rest)?)),
            b'$' => {
                let len = parse_int(rest)?;
                if len < 0 {
                    return Ok(RespValue::Bulk(None));
                }
                if len > MAX_BULK_LEN {
                    return Err(RespError::Protocol(format!("bulk length {len} too large")));
                }
                let len = len as usize;
                let mut buf = vec![0u8; len + 2];
                reader.read_exact(&mut buf).await?;
                if !buf.ends_with(b"\r\n") {
                    return Err(RespError::Protocol(
                        "bulk string missing terminator".to_string(),
                    ));
                }
                buf.truncate(len);
                Ok(RespValue::Bulk(Some(buf)))
            }
            b'*' => {
                let len = parse_int(rest)?;
                if len < 0 {
                    return Ok(RespValue::Array(None));
                }
                let mut items = Vec::with_capacity(len.min(1024) as usize);
                for _ in 0..len {
                    items.push(read_value(reader).await?);
                }
                Ok(RespValue::Array(Some(items)))
            }
            other => Err(RespError::Protocol(format!(
                "unknown reply type byte {:?}",
                other as char
            ))),
        }
    })
}

/// Read a `\r\n`-terminated line, returning it without the terminator.
async fn read_line<R>(reader: &mut R) -> RespResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Err(RespError::Closed);
    }
    if !line.ends_with(b"\r\n") {
        return Err(RespError::Protocol("line missing CRLF terminator".to_string()));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn utf8(bytes: &[u8]) -> RespResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| RespError::Protocol(format!("invalid utf-8 in reply: {e}")))
}

fn parse_int(bytes: &[u8]) -> RespResult<i64> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| RespError::Protocol("non-ascii integer".to_string()))?;
    s.parse::<i64>()
        .map_err(|_| RespError::Protocol(format!("invalid integer {s:?}")))
}
