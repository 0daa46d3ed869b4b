//! AEB Protocol - Wire protocol for the editor-assistant bridge
//!
//! This crate provides the binary framing and command parsing shared by
//! the bridge daemon and editor clients:
//!
//! - [`frame`] - fixed-layout, little-endian request/response framing
//! - [`command`] - slash-command classification of decoded request text
//!
//! The crate performs no I/O; everything here is pure functions over byte
//! slices and strings, so both sides of the socket (and tests) use the
//! exact same serialization rules.

pub mod command;
pub mod frame;

pub use command::{Command, Request};
pub use frame::{
    FrameError, RequestHeader, ResponseFrame, ResponsePreamble, MAX_CONTENT_LENGTH,
    REQUEST_HEADER_SIZE, REQUEST_MARKER, RESPONSE_MARKER, RESPONSE_PREAMBLE_SIZE,
};
