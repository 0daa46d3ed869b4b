//! AEB Daemon - session dispatcher for the editor-assistant bridge
//!
//! This crate provides the daemon's core infrastructure:
//! - `config` - host/port configuration with file and environment layers
//! - `server` - TCP server, per-connection dispatch, and chat streaming
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      aebd daemon                         │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌──────────────┐  one at a time  ┌───────────────────┐  │
//! │  │ BridgeServer │────────────────▶│ ConnectionHandler │  │
//! │  │ (TcpListener)│                 │  (read/dispatch)  │  │
//! │  └──────────────┘                 └─────────┬─────────┘  │
//! │                                             │            │
//! │                                   EngineCommand (mpsc)   │
//! │                                             ▼            │
//! │                                   ┌───────────────────┐  │
//! │                                   │   engine actor    │  │
//! │                                   │   (aeb-engine)    │  │
//! │                                   └───────────────────┘  │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one client connection is served at a time; the accept loop
//! re-enters after a connection closes, so a new editor session never
//! requires a daemon restart.

pub mod config;
pub mod server;
