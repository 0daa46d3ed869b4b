//! Binary framing for requests and responses.
//!
//! Both directions are length-prefixed little-endian frames with a fixed
//! magic marker, so a desynchronized peer is detected on the very next
//! read instead of being misparsed.
//!
//! Request layout (8-byte header + body):
//!
//! ```text
//! [0:4)   i32  marker (REQUEST_MARKER)
//! [4:8)   i32  content_length (> 0)
//! [8:..)  UTF-8 text, content_length bytes
//! ```
//!
//! Response layout (27-byte preamble + content):
//!
//! ```text
//! [0:4)   i32  marker (RESPONSE_MARKER)
//! [4:8)   i32  content_length
//! [8:9)   bool last
//! [9:10)  bool is_diff
//! [10:11) bool error
//! [11:15) i32  tokens_sent
//! [15:19) i32  tokens_received
//! [19:23) f32  message_cost
//! [23:27) f32  session_cost
//! [27:..) UTF-8 content, content_length bytes
//! ```
//!
//! The markers, field order, and widths are the compatibility contract:
//! any independent implementation must agree on them byte-for-byte.

use thiserror::Error;

/// Magic marker every request header must start with.
pub const REQUEST_MARKER: i32 = 987_654_321;

/// Magic marker every response preamble starts with.
pub const RESPONSE_MARKER: i32 = 123_456_789;

/// Size of the fixed request header in bytes.
pub const REQUEST_HEADER_SIZE: usize = 8;

/// Size of the fixed response preamble in bytes.
pub const RESPONSE_PREAMBLE_SIZE: usize = 27;

/// Maximum accepted request body size (1 MiB).
pub const MAX_CONTENT_LENGTH: i32 = 1_048_576;

/// Errors produced while encoding or decoding frames.
///
/// Every variant is a framing error in the protocol sense: the stream is
/// considered desynchronized and the connection unusable.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Truncated header: got {got} bytes, need {need}")]
    TruncatedHeader { got: usize, need: usize },

    #[error("Bad marker: expected {expected}, got {got}")]
    BadMarker { expected: i32, got: i32 },

    #[error("Invalid content length: {0}")]
    InvalidLength(i32),

    #[error("Content length {0} exceeds maximum of {MAX_CONTENT_LENGTH} bytes")]
    Oversize(i32),

    #[error("Truncated body: got {got} bytes, expected {expected}")]
    TruncatedBody { got: usize, expected: usize },

    #[error("Invalid UTF-8 in frame body: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(raw)
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

// ============================================================================
// Request framing
// ============================================================================

/// The fixed 8-byte preamble of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Number of UTF-8 body bytes following the header. Always positive.
    pub content_length: i32,
}

impl RequestHeader {
    /// Creates a header for a body of the given length.
    pub const fn new(content_length: i32) -> Self {
        Self { content_length }
    }

    /// Decodes a request header from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than [`REQUEST_HEADER_SIZE`] bytes are supplied, the
    /// marker does not match [`REQUEST_MARKER`], or the length is not in
    /// `1..=MAX_CONTENT_LENGTH`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < REQUEST_HEADER_SIZE {
            return Err(FrameError::TruncatedHeader {
                got: bytes.len(),
                need: REQUEST_HEADER_SIZE,
            });
        }

        let marker = read_i32(bytes, 0);
        if marker != REQUEST_MARKER {
            return Err(FrameError::BadMarker {
                expected: REQUEST_MARKER,
                got: marker,
            });
        }

        let content_length = read_i32(bytes, 4);
        if content_length <= 0 {
            return Err(FrameError::InvalidLength(content_length));
        }
        if content_length > MAX_CONTENT_LENGTH {
            return Err(FrameError::Oversize(content_length));
        }

        Ok(Self { content_length })
    }

    /// Encodes the header as 8 little-endian bytes.
    pub fn encode(&self) -> [u8; REQUEST_HEADER_SIZE] {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        buf[..4].copy_from_slice(&REQUEST_MARKER.to_le_bytes());
        buf[4..].copy_from_slice(&self.content_length.to_le_bytes());
        buf
    }
}

/// Decodes a request body as UTF-8 text.
///
/// Requires exactly `header.content_length` bytes at the start of `bytes`.
///
/// # Errors
///
/// Fails on a short read or invalid UTF-8.
pub fn decode_body(bytes: &[u8], header: &RequestHeader) -> Result<String, FrameError> {
    let expected = header.content_length as usize;
    if bytes.len() < expected {
        return Err(FrameError::TruncatedBody {
            got: bytes.len(),
            expected,
        });
    }

    Ok(String::from_utf8(bytes[..expected].to_vec())?)
}

/// Encodes a complete request frame (header + body) for the given text.
///
/// This is the client-side half of the request codec; the daemon only
/// decodes requests, but tests and editor clients share this function so
/// both directions agree on the layout.
pub fn encode_request(text: &str) -> Vec<u8> {
    let body = text.as_bytes();
    let header = RequestHeader::new(body.len() as i32);

    let mut buf = Vec::with_capacity(REQUEST_HEADER_SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf
}

// ============================================================================
// Response framing
// ============================================================================

/// One outbound response frame.
///
/// A logical answer is a sequence of frames: zero or more with
/// `last == false` and zeroed usage fields, then exactly one terminal
/// frame carrying the usage totals. `error == true` only ever appears on
/// a terminal frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub content: String,
    pub last: bool,
    /// Reserved: content is a diff rather than cumulative text. Never set
    /// by command replies.
    pub is_diff: bool,
    pub error: bool,
    pub tokens_sent: i32,
    pub tokens_received: i32,
    pub message_cost: f32,
    pub session_cost: f32,
}

impl ResponseFrame {
    /// A non-terminal frame carrying the cumulative text so far.
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            last: false,
            is_diff: false,
            error: false,
            tokens_sent: 0,
            tokens_received: 0,
            message_cost: 0.0,
            session_cost: 0.0,
        }
    }

    /// A single-frame command reply: terminal, no usage.
    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            last: true,
            ..Self::partial(content)
        }
    }

    /// A terminal error frame. Errors always terminate the answer.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            last: true,
            error: true,
            ..Self::partial(message)
        }
    }

    /// The terminal frame of a chat turn, carrying the usage totals.
    pub fn done(
        content: impl Into<String>,
        tokens_sent: i32,
        tokens_received: i32,
        message_cost: f32,
        session_cost: f32,
    ) -> Self {
        Self {
            content: content.into(),
            last: true,
            is_diff: false,
            error: false,
            tokens_sent,
            tokens_received,
            message_cost,
            session_cost,
        }
    }

    /// Serializes the frame: 27-byte preamble followed by the content
    /// bytes. The encoded length is always `27 + content.len()`.
    pub fn encode(&self) -> Vec<u8> {
        let content = self.content.as_bytes();
        let mut buf = Vec::with_capacity(RESPONSE_PREAMBLE_SIZE + content.len());

        buf.extend_from_slice(&RESPONSE_MARKER.to_le_bytes());
        buf.extend_from_slice(&(content.len() as i32).to_le_bytes());
        buf.push(self.last as u8);
        buf.push(self.is_diff as u8);
        buf.push(self.error as u8);
        buf.extend_from_slice(&self.tokens_sent.to_le_bytes());
        buf.extend_from_slice(&self.tokens_received.to_le_bytes());
        buf.extend_from_slice(&self.message_cost.to_le_bytes());
        buf.extend_from_slice(&self.session_cost.to_le_bytes());
        buf.extend_from_slice(content);

        buf
    }

    /// Decodes a complete frame (preamble + content) from `bytes`.
    ///
    /// # Errors
    ///
    /// Fails on a short buffer, a bad marker, or invalid UTF-8 content.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let preamble = ResponsePreamble::decode(bytes)?;
        let expected = preamble.content_length as usize;

        let rest = &bytes[RESPONSE_PREAMBLE_SIZE..];
        if rest.len() < expected {
            return Err(FrameError::TruncatedBody {
                got: rest.len(),
                expected,
            });
        }

        Ok(Self {
            content: String::from_utf8(rest[..expected].to_vec())?,
            last: preamble.last,
            is_diff: preamble.is_diff,
            error: preamble.error,
            tokens_sent: preamble.tokens_sent,
            tokens_received: preamble.tokens_received,
            message_cost: preamble.message_cost,
            session_cost: preamble.session_cost,
        })
    }
}

/// The decoded 27-byte response preamble, without the content.
///
/// Clients read this first to learn how many content bytes follow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponsePreamble {
    pub content_length: i32,
    pub last: bool,
    pub is_diff: bool,
    pub error: bool,
    pub tokens_sent: i32,
    pub tokens_received: i32,
    pub message_cost: f32,
    pub session_cost: f32,
}

impl ResponsePreamble {
    /// Decodes a response preamble from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Fails if fewer than [`RESPONSE_PREAMBLE_SIZE`] bytes are supplied,
    /// the marker does not match [`RESPONSE_MARKER`], or the length is
    /// negative.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < RESPONSE_PREAMBLE_SIZE {
            return Err(FrameError::TruncatedHeader {
                got: bytes.len(),
                need: RESPONSE_PREAMBLE_SIZE,
            });
        }

        let marker = read_i32(bytes, 0);
        if marker != RESPONSE_MARKER {
            return Err(FrameError::BadMarker {
                expected: RESPONSE_MARKER,
                got: marker,
            });
        }

        let content_length = read_i32(bytes, 4);
        if content_length < 0 {
            return Err(FrameError::InvalidLength(content_length));
        }

        Ok(Self {
            content_length,
            last: bytes[8] != 0,
            is_diff: bytes[9] != 0,
            error: bytes[10] != 0,
            tokens_sent: read_i32(bytes, 11),
            tokens_received: read_i32(bytes, 15),
            message_cost: read_f32(bytes, 19),
            session_cost: read_f32(bytes, 23),
        })
    }
}
