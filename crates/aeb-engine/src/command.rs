//! Engine actor commands and errors.
//!
//! Each command carries a `respond_to` oneshot so callers get a reply
//! without blocking the actor; [`EngineCommand::StreamChat`] additionally
//! hands back an mpsc receiver carrying the reply fragments.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::usage::UsageSnapshot;

/// The result of resolving user-supplied path text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Repository-relative path with `/` separators.
    pub path: String,
    /// Whether the resolved path names an existing repository file.
    pub exists: bool,
}

/// Commands sent to the engine actor.
#[derive(Debug)]
pub enum EngineCommand {
    /// List the files currently in the assistant's context, in a stable
    /// order.
    ListContext {
        respond_to: oneshot::Sender<Vec<String>>,
    },

    /// Resolve user path text to a repository-relative path and report
    /// whether it exists. The dispatcher never touches the filesystem;
    /// resolution is an engine concern.
    ResolvePath {
        input: String,
        respond_to: oneshot::Sender<ResolvedPath>,
    },

    /// Add a repository-relative path to the in-context set.
    AddToContext {
        path: String,
        respond_to: oneshot::Sender<()>,
    },

    /// Remove a repository-relative path from the in-context set.
    RemoveFromContext {
        path: String,
        respond_to: oneshot::Sender<()>,
    },

    /// List every file the engine knows about in the repository.
    ListRepoFiles {
        respond_to: oneshot::Sender<Vec<String>>,
    },

    /// Render the current repository map.
    RepoMap {
        respond_to: oneshot::Sender<String>,
    },

    /// Clear the in-context file set and the conversation history, both
    /// committed and pending messages.
    ResetContext {
        respond_to: oneshot::Sender<()>,
    },

    /// Submit a chat message. On success the reply is a receiver of text
    /// fragments: a lazy, finite, non-restartable sequence that ends when
    /// the sender side is dropped. Usage counters are updated as a side
    /// effect and readable via [`EngineCommand::Usage`] afterwards.
    StreamChat {
        message: String,
        respond_to: oneshot::Sender<Result<mpsc::Receiver<String>, EngineError>>,
    },

    /// Read the current usage counters.
    Usage {
        respond_to: oneshot::Sender<UsageSnapshot>,
    },
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine actor has shut down; its command channel is closed.
    #[error("Engine is no longer running")]
    ChannelClosed,

    /// The engine failed to process a chat message.
    #[error("Chat failed: {0}")]
    Chat(String),
}
