//! TCP basecaller backend.
//!
//! Speaks newline-delimited JSON to the basecall server, one connection per
//! session. After an open/ready handshake, reads are written as `read`
//! messages while a background task pumps `called` replies into a bounded
//! queue that `collect` drains. The queue keeps early replies from blocking
//! the peer while submissions are still in flight.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::types::{BasecallSession, Basecaller, BasecallerConfig, CalledRead, SessionError};
use crate::run_file::ReadRecord;

/// Basecaller backend connecting to a networked basecall server.
pub struct TcpBasecaller {
    config: BasecallerConfig,
}

impl TcpBasecaller {
    pub fn new(config: BasecallerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Basecaller for TcpBasecaller {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn open_session(&self) -> Result<Box<dyn BasecallSession>, SessionError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        debug!(%address, profile = %self.config.profile, "opening basecall session");

        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let stream = timeout(connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| SessionError::Unreachable(format!("connect to {address} timed out")))?
            .map_err(|e| SessionError::Unreachable(format!("connect to {address} failed: {e}")))?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        write_message(
            &mut writer,
            &ClientMessage::Open {
                profile: &self.config.profile,
            },
        )
        .await?;

        let mut line = String::new();
        let handshake = timeout(connect_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| SessionError::Unreachable(format!("handshake with {address} timed out")))?;
        if handshake? == 0 {
            return Err(SessionError::ConnectionClosed);
        }

        match parse_server_message(&line)? {
            ServerMessage::Ready => {}
            ServerMessage::Reject { reason } => return Err(SessionError::Rejected(reason)),
            other => {
                return Err(SessionError::Protocol(format!(
                    "expected ready or reject, got {other:?}"
                )))
            }
        }

        debug!(%address, "basecall session established");

        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        let reader_task = tokio::spawn(pump_results(reader, tx));

        Ok(Box::new(TcpSession {
            writer: Some(writer),
            results: rx,
            reader_task,
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
        }))
    }
}

/// Forwards `called` messages from the peer into the session queue until the
/// connection closes or the protocol breaks. A failure is delivered through
/// the queue so the next `collect` surfaces it.
async fn pump_results(
    mut reader: BufReader<OwnedReadHalf>,
    tx: mpsc::Sender<Result<CalledRead, SessionError>>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let item = match parse_server_message(&line) {
                    Ok(ServerMessage::Called {
                        read_id,
                        sequence,
                        qstring,
                        trimmed_samples,
                    }) => Ok(CalledRead {
                        read_id,
                        sequence,
                        qstring,
                        trimmed_samples,
                    }),
                    Ok(other) => Err(SessionError::Protocol(format!(
                        "unexpected message while draining: {other:?}"
                    ))),
                    Err(e) => Err(e),
                };

                match item {
                    Ok(called) => {
                        if tx.send(Ok(called)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "basecall session reader stopping");
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(SessionError::Io(e))).await;
                break;
            }
        }
    }
}

struct TcpSession {
    /// Taken on close; `None` marks the session closed.
    writer: Option<BufWriter<OwnedWriteHalf>>,
    results: mpsc::Receiver<Result<CalledRead, SessionError>>,
    reader_task: JoinHandle<()>,
    poll_interval: Duration,
}

#[async_trait]
impl BasecallSession for TcpSession {
    async fn submit(&mut self, read: &ReadRecord) -> Result<(), SessionError> {
        let writer = self.writer.as_mut().ok_or(SessionError::Closed)?;
        write_message(
            writer,
            &ClientMessage::Read {
                read_id: &read.read_id,
                signal: &read.signal,
            },
        )
        .await
    }

    async fn collect(&mut self) -> Result<Option<CalledRead>, SessionError> {
        if self.writer.is_none() {
            return Err(SessionError::Closed);
        }

        match timeout(self.poll_interval, self.results.recv()).await {
            Ok(Some(Ok(called))) => Ok(Some(called)),
            Ok(Some(Err(e))) => Err(e),
            // Reader gone without a queued error: the peer hung up on us
            Ok(None) => Err(SessionError::ConnectionClosed),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let mut writer = self.writer.take().ok_or(SessionError::Closed)?;

        let result = async {
            write_message(&mut writer, &ClientMessage::Close).await?;
            writer.shutdown().await?;
            Ok(())
        }
        .await;

        self.reader_task.abort();
        debug!("basecall session closed");
        result
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        // Covers sessions abandoned without an explicit close
        self.reader_task.abort();
    }
}

async fn write_message<W>(writer: &mut W, message: &ClientMessage<'_>) -> Result<(), SessionError>
where
    W: AsyncWriteExt + Unpin + Send,
{
    let mut line = serde_json::to_vec(message)
        .map_err(|e| SessionError::Protocol(format!("failed to encode message: {e}")))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

fn parse_server_message(line: &str) -> Result<ServerMessage, SessionError> {
    serde_json::from_str(line.trim()).map_err(|e| {
        SessionError::Protocol(format!("unparseable peer message {:?}: {e}", line.trim()))
    })
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientMessage<'a> {
    Open { profile: &'a str },
    Read { read_id: &'a str, signal: &'a [i16] },
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ServerMessage {
    Ready,
    Reject {
        reason: String,
    },
    Called {
        read_id: String,
        sequence: String,
        qstring: String,
        trimmed_samples: u64,
    },
}
