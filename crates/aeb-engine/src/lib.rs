//! AEB Engine - Adapter boundary to the AI coding-assistant engine
//!
//! The bridge daemon never talks to the assistant engine directly. The
//! engine is an actor owning all mutable assistant state (the in-context
//! file set, conversation history, usage counters); the daemon holds a
//! cheap-to-clone [`EngineHandle`] and communicates over an mpsc channel
//! with oneshot replies.
//!
//! ```text
//! ┌─────────────────┐   EngineCommand    ┌─────────────────┐
//! │  EngineHandle   │───────────────────▶│  engine actor   │
//! │ (per session)   │   (mpsc channel)   │ (state owner)   │
//! └─────────────────┘                    └─────────────────┘
//!          ▲                                      │
//!          │  oneshot replies / fragment channel  │
//!          └──────────────────────────────────────┘
//! ```
//!
//! This crate ships one concrete actor, the [`sim`] engine: an in-process
//! stand-in that echoes chat messages back as streamed word fragments and
//! tracks a word-count usage estimate. A real assistant backend plugs in
//! by spawning its own actor behind the same handle.

pub mod command;
pub mod handle;
pub mod sim;
pub mod usage;

pub use command::{EngineCommand, EngineError, ResolvedPath};
pub use handle::EngineHandle;
pub use sim::{spawn_sim_engine, SimEngineConfig};
pub use usage::{Money, TokenCount, UsageSnapshot};
