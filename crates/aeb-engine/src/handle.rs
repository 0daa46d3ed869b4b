//! Client interface for interacting with an engine actor.
//!
//! The `EngineHandle` is a cheap-to-clone wrapper over the actor's command
//! channel. Every method is async; a closed channel (the actor task has
//! stopped) maps to [`EngineError::ChannelClosed`].

use tokio::sync::{mpsc, oneshot};

use crate::command::{EngineCommand, EngineError, ResolvedPath};
use crate::usage::UsageSnapshot;

/// Handle for interacting with the engine actor.
///
/// Owned by the session dispatcher and passed explicitly wherever engine
/// access is needed, so independent server instances (for example under
/// test) never share state.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Creates a handle over an actor's command channel.
    pub fn new(sender: mpsc::Sender<EngineCommand>) -> Self {
        Self { sender }
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Lists the files currently in the assistant's context.
    pub async fn list_context(&self) -> Result<Vec<String>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::ListContext { respond_to: tx }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Resolves user path text to a repository-relative path.
    pub async fn resolve_path(&self, input: &str) -> Result<ResolvedPath, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::ResolvePath {
            input: input.to_string(),
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Adds a repository-relative path to the in-context set.
    pub async fn add_to_context(&self, path: String) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::AddToContext {
            path,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Removes a repository-relative path from the in-context set.
    pub async fn remove_from_context(&self, path: String) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::RemoveFromContext {
            path,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Lists every repository file the engine knows about.
    pub async fn list_repo_files(&self) -> Result<Vec<String>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::ListRepoFiles { respond_to: tx }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Renders the current repository map.
    pub async fn repo_map(&self) -> Result<String, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::RepoMap { respond_to: tx }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Clears the in-context file set and conversation history.
    pub async fn reset_context(&self) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::ResetContext { respond_to: tx }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Submits a chat message and returns the fragment stream.
    ///
    /// The receiver yields successive reply fragments and ends when the
    /// engine finishes the turn. The sequence is finite and cannot be
    /// restarted; usage counters are readable via [`Self::usage`] once it
    /// is exhausted.
    pub async fn stream_chat(
        &self,
        message: String,
    ) -> Result<mpsc::Receiver<String>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::StreamChat {
            message,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Reads the current usage counters.
    pub async fn usage(&self) -> Result<UsageSnapshot, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Usage { respond_to: tx }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}
