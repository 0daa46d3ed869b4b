//! In-process simulated engine actor.
//!
//! A stand-in for a real assistant backend: it owns an in-memory
//! repository file set and context, echoes chat messages back as streamed
//! word fragments, and maintains a word-count usage estimate. The shipped
//! daemon runs on it out of the box; tests drive it with scripted replies
//! and failure injection.

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::command::{EngineCommand, EngineError, ResolvedPath};
use crate::handle::EngineHandle;
use crate::usage::{Money, TokenCount, UsageSnapshot};

/// Command channel buffer size.
const COMMAND_BUFFER: usize = 64;

/// Fragment channel buffer size per chat turn.
const FRAGMENT_BUFFER: usize = 16;

/// Simulated price per submitted word-token, in microdollars.
const SENT_TOKEN_PRICE: i64 = 3;

/// Simulated price per received word-token, in microdollars.
const RECEIVED_TOKEN_PRICE: i64 = 15;

/// Configuration for the simulated engine.
#[derive(Debug, Clone, Default)]
pub struct SimEngineConfig {
    /// Repository-relative paths the engine knows about.
    pub repo_files: Vec<String>,

    /// Fixed repository-map text; when `None` the map is rendered from
    /// `repo_files`.
    pub repo_map: Option<String>,

    /// Replies to use for successive chat turns instead of echoing, each
    /// as a sequence of fragments. Consumed front to back; once empty,
    /// turns fall back to echo replies.
    pub scripted_replies: Vec<Vec<String>>,

    /// Pause between streamed fragments. Zero streams as fast as the
    /// consumer reads.
    pub fragment_delay: Duration,

    /// When set, every chat turn fails with this message.
    pub chat_failure: Option<String>,
}

impl SimEngineConfig {
    /// Builds a config whose repository view is a scan of `root`.
    ///
    /// Hidden files and directories (leading `.`, including `.git`) are
    /// skipped; paths are stored repository-relative with `/` separators.
    pub fn from_dir(root: &Path) -> Self {
        let mut files = BTreeSet::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.insert(rel.to_string_lossy().replace('\\', "/"));
            }
        }

        Self {
            repo_files: files.into_iter().collect(),
            ..Self::default()
        }
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Spawns the simulated engine actor and returns a handle to it.
///
/// The actor runs until every handle is dropped.
pub fn spawn_sim_engine(config: SimEngineConfig) -> EngineHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = SimEngine::new(rx, config);
    tokio::spawn(actor.run());

    EngineHandle::new(tx)
}

/// The simulated engine actor - owns all assistant state.
///
/// Commands are processed sequentially in a single task; only fragment
/// production for a chat turn runs on a side task, writing into a channel
/// that the caller drains.
struct SimEngine {
    receiver: mpsc::Receiver<EngineCommand>,

    /// Every file in the simulated repository, sorted.
    repo_files: BTreeSet<String>,

    /// Files currently in the assistant's context, sorted.
    context: BTreeSet<String>,

    /// Chat messages accepted so far; cleared on reset.
    history: Vec<String>,

    repo_map: Option<String>,
    scripted: VecDeque<Vec<String>>,
    fragment_delay: Duration,
    chat_failure: Option<String>,

    last_tokens_sent: TokenCount,
    last_tokens_received: TokenCount,
    last_message_cost: Money,
    session_cost: Money,
}

impl SimEngine {
    fn new(receiver: mpsc::Receiver<EngineCommand>, config: SimEngineConfig) -> Self {
        Self {
            receiver,
            repo_files: config.repo_files.into_iter().collect(),
            context: BTreeSet::new(),
            history: Vec::new(),
            repo_map: config.repo_map,
            scripted: config.scripted_replies.into(),
            fragment_delay: config.fragment_delay,
            chat_failure: config.chat_failure,
            last_tokens_sent: TokenCount::zero(),
            last_tokens_received: TokenCount::zero(),
            last_message_cost: Money::zero(),
            session_cost: Money::zero(),
        }
    }

    async fn run(mut self) {
        info!(repo_files = self.repo_files.len(), "Sim engine starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("Sim engine stopped");
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::ListContext { respond_to } => {
                let _ = respond_to.send(self.context.iter().cloned().collect());
            }
            EngineCommand::ResolvePath { input, respond_to } => {
                let _ = respond_to.send(self.resolve(&input));
            }
            EngineCommand::AddToContext { path, respond_to } => {
                debug!(path = %path, "Adding file to context");
                self.context.insert(path);
                let _ = respond_to.send(());
            }
            EngineCommand::RemoveFromContext { path, respond_to } => {
                debug!(path = %path, "Removing file from context");
                self.context.remove(&path);
                let _ = respond_to.send(());
            }
            EngineCommand::ListRepoFiles { respond_to } => {
                let _ = respond_to.send(self.repo_files.iter().cloned().collect());
            }
            EngineCommand::RepoMap { respond_to } => {
                let map = match &self.repo_map {
                    Some(map) => map.clone(),
                    None => self
                        .repo_files
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join("\n"),
                };
                let _ = respond_to.send(map);
            }
            EngineCommand::ResetContext { respond_to } => {
                info!(
                    dropped = self.context.len(),
                    messages = self.history.len(),
                    "Resetting context and history"
                );
                self.context.clear();
                self.history.clear();
                let _ = respond_to.send(());
            }
            EngineCommand::StreamChat {
                message,
                respond_to,
            } => {
                self.handle_stream_chat(message, respond_to);
            }
            EngineCommand::Usage { respond_to } => {
                let _ = respond_to.send(UsageSnapshot {
                    tokens_sent: self.last_tokens_sent,
                    tokens_received: self.last_tokens_received,
                    message_cost: self.last_message_cost,
                    session_cost: self.session_cost,
                });
            }
        }
    }

    fn handle_stream_chat(
        &mut self,
        message: String,
        respond_to: oneshot::Sender<Result<mpsc::Receiver<String>, EngineError>>,
    ) {
        if let Some(reason) = &self.chat_failure {
            let _ = respond_to.send(Err(EngineError::Chat(reason.clone())));
            return;
        }

        let fragments = match self.scripted.pop_front() {
            Some(script) => script,
            None => echo_fragments(&message),
        };

        // Word-count token estimate; counters must be final before the
        // caller drains the fragment stream and queries usage.
        let sent = TokenCount::new(message.split_whitespace().count() as u64);
        let received = TokenCount::new(
            fragments
                .iter()
                .map(|f| f.split_whitespace().count() as u64)
                .sum(),
        );
        let cost = Money::from_microdollars(
            sent.as_u64() as i64 * SENT_TOKEN_PRICE
                + received.as_u64() as i64 * RECEIVED_TOKEN_PRICE,
        );

        self.history.push(message);
        self.last_tokens_sent = sent;
        self.last_tokens_received = received;
        self.last_message_cost = cost;
        self.session_cost += cost;

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let delay = self.fragment_delay;

        tokio::spawn(async move {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                // Consumer hung up mid-turn; nothing left to do.
                if tx.send(fragment).await.is_err() {
                    break;
                }
            }
        });

        let _ = respond_to.send(Ok(rx));
    }

    /// Normalizes user path text to a repository-relative path.
    ///
    /// Backslash separators are rewritten to `/` and a leading `./` is
    /// stripped; existence is membership in the repository file set.
    fn resolve(&self, input: &str) -> ResolvedPath {
        let normalized = input.trim().replace('\\', "/");
        let path = normalized
            .strip_prefix("./")
            .unwrap_or(&normalized)
            .to_string();
        let exists = self.repo_files.contains(&path);

        ResolvedPath { path, exists }
    }
}

fn echo_fragments(message: &str) -> Vec<String> {
    let reply = format!("Echo: {}", message.trim());
    let words: Vec<&str> = reply.split_whitespace().collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i < last {
                format!("{word} ")
            } else {
                (*word).to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_files(files: &[&str]) -> EngineHandle {
        spawn_sim_engine(SimEngineConfig {
            repo_files: files.iter().map(|f| f.to_string()).collect(),
            ..SimEngineConfig::default()
        })
    }

    async fn collect(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment);
        }
        fragments
    }

    #[tokio::test]
    async fn context_add_remove_reset() {
        let engine = engine_with_files(&["src/a.rs", "src/b.rs"]);

        engine.add_to_context("src/a.rs".to_string()).await.unwrap();
        engine.add_to_context("src/b.rs".to_string()).await.unwrap();
        assert_eq!(
            engine.list_context().await.unwrap(),
            vec!["src/a.rs", "src/b.rs"]
        );

        engine.remove_from_context("src/a.rs".to_string()).await.unwrap();
        assert_eq!(engine.list_context().await.unwrap(), vec!["src/b.rs"]);

        engine.reset_context().await.unwrap();
        assert!(engine.list_context().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_normalizes_separators() {
        let engine = engine_with_files(&["src/a.rs"]);

        let resolved = engine.resolve_path("src\\a.rs").await.unwrap();
        assert_eq!(resolved.path, "src/a.rs");
        assert!(resolved.exists);

        let resolved = engine.resolve_path("./src/a.rs").await.unwrap();
        assert_eq!(resolved.path, "src/a.rs");
        assert!(resolved.exists);

        let resolved = engine.resolve_path("src/missing.rs").await.unwrap();
        assert!(!resolved.exists);
    }

    #[tokio::test]
    async fn echo_turn_streams_word_fragments() {
        let engine = engine_with_files(&[]);

        let rx = engine.stream_chat("hello world".to_string()).await.unwrap();
        let fragments = collect(rx).await;

        assert_eq!(fragments, vec!["Echo: ", "hello ", "world"]);
        assert_eq!(fragments.concat(), "Echo: hello world");
    }

    #[tokio::test]
    async fn scripted_replies_are_consumed_in_order() {
        let engine = spawn_sim_engine(SimEngineConfig {
            scripted_replies: vec![
                vec!["first".to_string()],
                vec!["second".to_string()],
            ],
            ..SimEngineConfig::default()
        });

        let rx = engine.stream_chat("one".to_string()).await.unwrap();
        assert_eq!(collect(rx).await.concat(), "first");

        let rx = engine.stream_chat("two".to_string()).await.unwrap();
        assert_eq!(collect(rx).await.concat(), "second");

        // Script exhausted, back to echoing.
        let rx = engine.stream_chat("three".to_string()).await.unwrap();
        assert_eq!(collect(rx).await.concat(), "Echo: three");
    }

    #[tokio::test]
    async fn usage_tracks_turn_and_session() {
        let engine = engine_with_files(&[]);

        let rx = engine.stream_chat("two words".to_string()).await.unwrap();
        collect(rx).await;

        let first = engine.usage().await.unwrap();
        assert_eq!(first.tokens_sent.as_u64(), 2);
        assert_eq!(first.tokens_received.as_u64(), 3); // "Echo:" + 2 words
        assert!(!first.message_cost.is_zero());
        assert_eq!(first.session_cost, first.message_cost);

        let rx = engine.stream_chat("more".to_string()).await.unwrap();
        collect(rx).await;

        let second = engine.usage().await.unwrap();
        assert_eq!(second.session_cost, first.session_cost + second.message_cost);
    }

    #[tokio::test]
    async fn chat_failure_is_injected() {
        let engine = spawn_sim_engine(SimEngineConfig {
            chat_failure: Some("model unavailable".to_string()),
            ..SimEngineConfig::default()
        });

        let err = engine.stream_chat("hi".to_string()).await.unwrap_err();
        assert_eq!(err, EngineError::Chat("model unavailable".to_string()));
    }

    #[tokio::test]
    async fn repo_map_defaults_to_file_listing() {
        let engine = engine_with_files(&["lib/z.rs", "src/a.rs"]);
        assert_eq!(engine.repo_map().await.unwrap(), "lib/z.rs\nsrc/a.rs");

        let engine = spawn_sim_engine(SimEngineConfig {
            repo_map: Some("the map".to_string()),
            ..SimEngineConfig::default()
        });
        assert_eq!(engine.repo_map().await.unwrap(), "the map");
    }

    #[tokio::test]
    async fn from_dir_scans_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        std::fs::write(dir.path().join(".git/config"), "").unwrap();

        let config = SimEngineConfig::from_dir(dir.path());
        assert_eq!(config.repo_files, vec!["README.md", "src/main.rs"]);
    }
}
