//! Lazily-connected Redis client.
//!
//! One TCP connection, opened on first use and dropped after any I/O or
//! protocol error so the next query reconnects. Server `-ERR` replies
//! leave the connection intact.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::error::{RespError, RespResult};
use crate::resp::{RespValue, encode_command, read_value};

type Connection = BufReader<TcpStream>;

pub struct RespClient {
    addr: String,
    password: Option<String>,
    timeout: Duration,
    conn: Option<Connection>,
}

impl std::fmt::Debug for RespClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespClient")
            .field("addr", &self.addr)
            .field("auth", &self.password.is_some())
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

impl RespClient {
    /// Create a client for `addr` (`host:port`). Does not connect.
    pub fn new(addr: impl Into<String>, password: Option<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            password,
            timeout,
            conn: None,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Send a command and return its reply.
    ///
    /// A `-ERR` reply is returned as [`RespError::Server`].
    pub async fn query(&mut self, args: &[&str]) -> RespResult<RespValue> {
        let timeout = self.timeout;
        let conn = self.connection().await?;
        let reply = exchange(conn, args, timeout).await;

        match reply {
            Ok(RespValue::Error(msg)) => Err(RespError::Server(msg)),
            Ok(value) => Ok(value),
            Err(e) => {
                debug!(addr = %self.addr, error = %e, "dropping redis connection");
                self.conn = None;
                Err(e)
            }
        }
    }

    /// `PING`, true on `+PONG`.
    pub async fn ping(&mut self) -> RespResult<bool> {
        match self.query(&["PING"]).await? {
            RespValue::Simple(s) => Ok(s == "PONG"),
            _ => Ok(false),
        }
    }

    /// `SMEMBERS key`. Members that are not valid UTF-8 are logged and skipped.
    pub async fn smembers(&mut self, key: &str) -> RespResult<Vec<String>> {
        match self.query(&["SMEMBERS", key]).await? {
            RespValue::Array(Some(items)) => {
                let mut members = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        RespValue::Bulk(Some(bytes)) => match String::from_utf8(bytes) {
                            Ok(member) => members.push(member),
                            Err(e) => error!(
                                key,
                                member = %String::from_utf8_lossy(e.as_bytes()),
                                "skipping set member that is not valid UTF-8"
                            ),
                        },
                        other => return Err(unexpected("SMEMBERS", &other)),
                    }
                }
                Ok(members)
            }
            RespValue::Array(None) => Ok(Vec::new()),
            other => Err(unexpected("SMEMBERS", &other)),
        }
    }

    /// `EXISTS key`.
    pub async fn exists(&mut self, key: &str) -> RespResult<bool> {
        match self.query(&["EXISTS", key]).await? {
            RespValue::Integer(n) => Ok(n > 0),
            other => Err(unexpected("EXISTS", &other)),
        }
    }

    /// `LLEN key`.
    pub async fn llen(&mut self, key: &str) -> RespResult<u64> {
        match self.query(&["LLEN", key]).await? {
            RespValue::Integer(n) => Ok(n.max(0) as u64),
            other => Err(unexpected("LLEN", &other)),
        }
    }

    async fn connection(&mut self) -> RespResult<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.connect().await?,
        };
        Ok(self.conn.insert(conn))
    }

    async fn connect(&self) -> RespResult<Connection> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| RespError::Timeout(self.timeout))?
            .map_err(|source| RespError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let mut conn = BufReader::new(stream);

        if let Some(password) = &self.password {
            match exchange(&mut conn, &["AUTH", password.as_str()], self.timeout).await? {
                RespValue::Simple(_) => {}
                RespValue::Error(msg) => return Err(RespError::Auth(msg)),
                other => return Err(unexpected("AUTH", &other)),
            }
        }

        debug!(addr = %self.addr, "connected to redis");
        Ok(conn)
    }
}

/// Write one command and read its reply, bounded by `timeout`.
async fn exchange(
    conn: &mut Connection,
    args: &[&str],
    timeout: Duration,
) -> RespResult<RespValue> {
    let request = encode_command(args);
    let round_trip = async {
        conn.write_all(&request).await?;
        conn.flush().await?;
        read_value(conn).await
    };
    tokio::time::timeout(timeout, round_trip)
        .await
        .map_err(|_| RespError::Timeout(timeout))?
}

fn unexpected(command: &str, reply: &RespValue) -> RespError {
    RespError::UnexpectedReply {
        command: command.to_string(),
        reply: reply.to_string(),
    }
}
