//! Per-connection request loop: framing, dispatch, and chat streaming.
//!
//! One `ConnectionHandler` serves one accepted socket. It reads framed
//! requests, routes commands against the engine, and streams chat turns
//! back as cumulative partial frames followed by a terminal usage frame.
//!
//! Error policy per request cycle:
//! - Framing errors (bad marker, bad length, short read, invalid UTF-8)
//!   poison the stream; the connection is closed without a response and
//!   the server returns to accepting.
//! - Command and engine errors are answered with a single terminal error
//!   frame; the connection stays open.
//! - Write failures (including timeouts) abort the connection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use aeb_engine::{EngineError, EngineHandle};
use aeb_protocol::frame::{self, FrameError, RequestHeader, REQUEST_HEADER_SIZE};
use aeb_protocol::{Command, Request, ResponseFrame};

/// Write timeout per frame. A client that stops draining its socket for
/// this long is treated as gone.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Acknowledgement for a chat message that is empty after trimming.
const EMPTY_CHAT_REPLY: &str = "Nothing to send.";

/// Handler for a single client connection.
pub struct ConnectionHandler {
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    engine: EngineHandle,
    connection_number: u64,
}

impl ConnectionHandler {
    /// Creates a handler over an accepted stream.
    pub fn new(stream: TcpStream, engine: EngineHandle, connection_number: u64) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer: BufWriter::new(writer),
            engine,
            connection_number,
        }
    }

    /// Runs the request loop until the client disconnects or the
    /// transport fails. Returns when the connection is done; the caller
    /// goes back to accepting.
    pub async fn run(mut self) {
        loop {
            let request = match self.read_request().await {
                Ok(request) => request,
                Err(ConnectionError::Eof) => {
                    debug!(connection = self.connection_number, "Client closed connection");
                    break;
                }
                Err(e) => {
                    warn!(
                        connection = self.connection_number,
                        error = %e,
                        "Closing connection after protocol failure"
                    );
                    break;
                }
            };

            if let Err(e) = self.dispatch(&request).await {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Closing connection after write failure"
                );
                break;
            }
        }

        info!(connection = self.connection_number, "Client disconnected");
    }

    /// Reads and parses one request.
    ///
    /// Zero bytes at a message boundary is a clean close; a partial
    /// header or body is a framing error. The body read tolerates
    /// arbitrary packet fragmentation by accumulating until
    /// `content_length` bytes have arrived.
    async fn read_request(&mut self) -> Result<Request, ConnectionError> {
        let mut header_buf = [0u8; REQUEST_HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header_buf).await?;
        if got == 0 {
            return Err(ConnectionError::Eof);
        }
        if got < REQUEST_HEADER_SIZE {
            return Err(FrameError::TruncatedHeader {
                got,
                need: REQUEST_HEADER_SIZE,
            }
            .into());
        }

        let header = RequestHeader::decode(&header_buf)?;

        let mut body = vec![0u8; header.content_length as usize];
        let got = read_full(&mut self.reader, &mut body).await?;
        if got < body.len() {
            return Err(FrameError::TruncatedBody {
                got,
                expected: body.len(),
            }
            .into());
        }

        let text = frame::decode_body(&body, &header)?;

        debug!(
            connection = self.connection_number,
            bytes = body.len(),
            "Received request"
        );

        Ok(Request::parse(&text))
    }

    /// Routes one request to a command handler or a chat turn.
    ///
    /// Only transport failures propagate; command and engine errors are
    /// written back as error frames.
    async fn dispatch(&mut self, request: &Request) -> Result<(), ConnectionError> {
        debug!(
            connection = self.connection_number,
            command = ?request.command(),
            "Dispatching request"
        );

        match request.command() {
            Command::Unknown => {
                let frame = ResponseFrame::error(format!(
                    "The command {} is not recognized.",
                    request.raw_token()
                ));
                self.write_frame(&frame).await
            }
            Command::Ls => {
                let frame = match self.engine.list_context().await {
                    Ok(files) => ResponseFrame::reply(files.join("\n")),
                    Err(e) => ResponseFrame::error(e.to_string()),
                };
                self.write_frame(&frame).await
            }
            Command::Map => {
                let frame = match self.engine.repo_map().await {
                    Ok(map) => ResponseFrame::reply(map),
                    Err(e) => ResponseFrame::error(e.to_string()),
                };
                self.write_frame(&frame).await
            }
            Command::Reset => {
                let frame = match self.engine.reset_context().await {
                    Ok(()) => ResponseFrame::reply("Reset chat successfully."),
                    Err(e) => ResponseFrame::error(e.to_string()),
                };
                self.write_frame(&frame).await
            }
            Command::Add => {
                let frame = match self.resolve_add(request.args()).await {
                    Ok(frame) => frame,
                    Err(e) => ResponseFrame::error(e.to_string()),
                };
                self.write_frame(&frame).await
            }
            Command::Drop => {
                let frame = match self.resolve_drop(request.args()).await {
                    Ok(frame) => frame,
                    Err(e) => ResponseFrame::error(e.to_string()),
                };
                self.write_frame(&frame).await
            }
            // Plain chat and pass-through commands. The full text goes to
            // the engine so its own command layer sees the token.
            _ => self.chat_turn(request.text()).await,
        }
    }

    /// Handles `/add`: exact path first, then unique-suffix fallback
    /// against all repository files.
    async fn resolve_add(&mut self, target: &str) -> Result<ResponseFrame, EngineError> {
        let resolved = self.engine.resolve_path(target).await?;

        if resolved.exists {
            self.engine.add_to_context(resolved.path.clone()).await?;
            return Ok(ResponseFrame::reply(format!("Added {}", resolved.path)));
        }

        let candidates = self.engine.list_repo_files().await?;
        let matches = suffix_matches(&resolved.path, &candidates);

        if let [only] = matches.as_slice() {
            self.engine.add_to_context(only.clone()).await?;
            return Ok(ResponseFrame::reply(format!("Added {only} implicitly.")));
        }

        Ok(ResponseFrame::error(format!(
            "Cannot add {} because it does not exist.",
            resolved.path
        )))
    }

    /// Handles `/drop`: exact path first, then unique-suffix fallback
    /// against the files currently in context.
    async fn resolve_drop(&mut self, target: &str) -> Result<ResponseFrame, EngineError> {
        let resolved = self.engine.resolve_path(target).await?;
        let in_context = self.engine.list_context().await?;

        if in_context.contains(&resolved.path) {
            self.engine.remove_from_context(resolved.path.clone()).await?;
            return Ok(ResponseFrame::reply(format!("Dropped {}", resolved.path)));
        }

        let matches = suffix_matches(&resolved.path, &in_context);

        if let [only] = matches.as_slice() {
            self.engine.remove_from_context(only.clone()).await?;
            return Ok(ResponseFrame::reply(format!("Dropped {only} implicitly.")));
        }

        Ok(ResponseFrame::error(format!(
            "Cannot drop {} because it is not in chat.",
            resolved.path
        )))
    }

    /// Runs one chat turn: streams cumulative partial frames for each
    /// engine fragment, then a terminal frame with the usage totals.
    async fn chat_turn(&mut self, message: &str) -> Result<(), ConnectionError> {
        if message.trim().is_empty() {
            // Nothing to submit; acknowledge without an engine call.
            return self.write_frame(&ResponseFrame::reply(EMPTY_CHAT_REPLY)).await;
        }

        let mut fragments = match self.engine.stream_chat(message.to_string()).await {
            Ok(rx) => rx,
            Err(e) => return self.write_frame(&ResponseFrame::error(e.to_string())).await,
        };

        let mut accumulated = String::new();
        while let Some(fragment) = fragments.recv().await {
            accumulated.push_str(&fragment);
            // Every partial frame carries the whole answer so far, so the
            // client can render any frame standalone.
            self.write_frame(&ResponseFrame::partial(accumulated.clone())).await?;
        }

        let usage = match self.engine.usage().await {
            Ok(usage) => usage,
            Err(e) => return self.write_frame(&ResponseFrame::error(e.to_string())).await,
        };

        info!(
            connection = self.connection_number,
            tokens_sent = usage.tokens_sent.as_u64(),
            tokens_received = usage.tokens_received.as_u64(),
            message_cost = %usage.message_cost,
            session_cost = %usage.session_cost,
            "Chat turn complete"
        );

        self.write_frame(&ResponseFrame::done(
            accumulated,
            usage.tokens_sent.as_i32(),
            usage.tokens_received.as_i32(),
            usage.message_cost.as_f32(),
            usage.session_cost.as_f32(),
        ))
        .await
    }

    /// Writes one frame, bounded by [`WRITE_TIMEOUT`].
    async fn write_frame(&mut self, frame: &ResponseFrame) -> Result<(), ConnectionError> {
        let bytes = frame.encode();

        let result = timeout(WRITE_TIMEOUT, async {
            self.writer.write_all(&bytes).await?;
            self.writer.flush().await
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }
}

/// Reads until `buf` is full or the peer closes. Returns the number of
/// bytes actually read, tolerating arbitrary packet fragmentation.
async fn read_full(reader: &mut OwnedReadHalf, buf: &mut [u8]) -> Result<usize, ConnectionError> {
    let mut filled = 0;

    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(filled)
}

/// Finds repository paths whose final segment equals the target's final
/// segment: the candidate must equal the segment exactly or end with
/// `/<segment>`, separators normalized to `/`.
///
/// Callers act only on a single match; ties are reported as errors, never
/// auto-resolved.
fn suffix_matches(target: &str, candidates: &[String]) -> Vec<String> {
    let normalized = target.replace('\\', "/");
    let name = normalized.rsplit('/').next().unwrap_or(&normalized);
    if name.is_empty() {
        return Vec::new();
    }

    let suffix = format!("/{name}");
    candidates
        .iter()
        .filter(|candidate| {
            let candidate = candidate.replace('\\', "/");
            candidate == name || candidate.ends_with(&suffix)
        })
        .cloned()
        .collect()
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Eof,

    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timed out")]
    WriteTimeout,
}
