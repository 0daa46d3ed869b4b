//! Slash-command classification of request text.
//!
//! A request whose text starts with `/` carries a command token; everything
//! else is free-form chat. Token matching is an explicit table from the
//! normalized token (uppercased, `-` replaced by `_`) to a closed enum,
//! with [`Command::Unknown`] as the fallthrough for unrecognized tokens.

/// The closed set of commands a client can send.
///
/// `None` means the text has no command prefix; `Unknown` means the prefix
/// did not match any known token. Neither is ever forwarded to the engine
/// as a command. The variants from `Architect` onward are recognized but
/// not handled specially by the dispatcher: they fall through to the chat
/// path, where the engine's own command layer interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    None,
    Unknown,
    Add,
    Architect,
    Ask,
    ChatMode,
    Clear,
    Code,
    Commit,
    Drop,
    Lint,
    Load,
    Ls,
    Map,
    MapRefresh,
    ReadOnly,
    Reset,
    Undo,
    Web,
}

impl Command {
    /// Looks up a normalized token (uppercase, `_` separators) in the
    /// command table.
    pub fn from_token(normalized: &str) -> Option<Command> {
        let command = match normalized {
            "ADD" => Command::Add,
            "ARCHITECT" => Command::Architect,
            "ASK" => Command::Ask,
            "CHAT_MODE" => Command::ChatMode,
            "CLEAR" => Command::Clear,
            "CODE" => Command::Code,
            "COMMIT" => Command::Commit,
            "DROP" => Command::Drop,
            "LINT" => Command::Lint,
            "LOAD" => Command::Load,
            "LS" => Command::Ls,
            "MAP" => Command::Map,
            "MAP_REFRESH" => Command::MapRefresh,
            "READ_ONLY" => Command::ReadOnly,
            "RESET" => Command::Reset,
            "UNDO" => Command::Undo,
            "WEB" => Command::Web,
            _ => return None,
        };
        Some(command)
    }
}

/// A decoded request with its derived command fields.
///
/// Constructed once per inbound message and discarded after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    text: String,
    command: Command,
    raw_token: String,
    args: String,
}

impl Request {
    /// Parses request text into a command and argument text.
    ///
    /// Leading and trailing whitespace is trimmed. Text not starting with
    /// `/` is classified as [`Command::None`] with the full text as
    /// arguments. Otherwise the first whitespace-delimited token (leading
    /// `/` stripped) is normalized and matched against the command table;
    /// the un-normalized token is kept for error messages. Argument text
    /// is the remainder re-joined with single spaces.
    pub fn parse(text: &str) -> Request {
        let text = text.trim();

        if !text.starts_with('/') {
            return Request {
                text: text.to_string(),
                command: Command::None,
                raw_token: String::new(),
                args: text.to_string(),
            };
        }

        let mut words = text.split_whitespace();
        let raw_token = words
            .next()
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();
        let args = words.collect::<Vec<_>>().join(" ");

        let command = if raw_token.is_empty() {
            // A bare "/" carries no token; treat it as plain chat text.
            Command::None
        } else {
            let normalized = raw_token.to_uppercase().replace('-', "_");
            Command::from_token(&normalized).unwrap_or(Command::Unknown)
        };

        Request {
            text: text.to_string(),
            command,
            raw_token,
            args,
        }
    }

    /// The full trimmed request text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The resolved command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The command token exactly as the client typed it, without the
    /// leading `/`. Empty when there is no command prefix.
    pub fn raw_token(&self) -> &str {
        &self.raw_token
    }

    /// The text with the command token removed, single-spaced and trimmed.
    pub fn args(&self) -> &str {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        let req = Request::parse("  how does the parser work?  ");
        assert_eq!(req.command(), Command::None);
        assert_eq!(req.text(), "how does the parser work?");
        assert_eq!(req.args(), "how does the parser work?");
        assert_eq!(req.raw_token(), "");
    }

    #[test]
    fn token_matching_ignores_case_and_separator() {
        for text in ["/chat-mode ask", "/CHAT_MODE ask", "/Chat-Mode ask", "/chat_mode ask"] {
            let req = Request::parse(text);
            assert_eq!(req.command(), Command::ChatMode, "for {text:?}");
            assert_eq!(req.args(), "ask");
        }
    }

    #[test]
    fn unknown_token_is_preserved_verbatim() {
        let req = Request::parse("/unknownthing do stuff");
        assert_eq!(req.command(), Command::Unknown);
        assert_eq!(req.raw_token(), "unknownthing");
        assert_eq!(req.args(), "do stuff");
    }

    #[test]
    fn args_are_rejoined_with_single_spaces() {
        let req = Request::parse("  /add   src/main.rs    extra  ");
        assert_eq!(req.command(), Command::Add);
        assert_eq!(req.args(), "src/main.rs extra");
    }

    #[test]
    fn bare_slash_is_plain_text() {
        let req = Request::parse("/");
        assert_eq!(req.command(), Command::None);
        assert_eq!(req.args(), "");
    }

    #[test]
    fn all_known_tokens_resolve() {
        let cases = [
            ("/add", Command::Add),
            ("/architect", Command::Architect),
            ("/ask", Command::Ask),
            ("/chat-mode", Command::ChatMode),
            ("/clear", Command::Clear),
            ("/code", Command::Code),
            ("/commit", Command::Commit),
            ("/drop", Command::Drop),
            ("/lint", Command::Lint),
            ("/load", Command::Load),
            ("/ls", Command::Ls),
            ("/map", Command::Map),
            ("/map-refresh", Command::MapRefresh),
            ("/read-only", Command::ReadOnly),
            ("/reset", Command::Reset),
            ("/undo", Command::Undo),
            ("/web", Command::Web),
        ];
        for (text, expected) in cases {
            assert_eq!(Request::parse(text).command(), expected, "for {text:?}");
        }
    }

    #[test]
    fn command_only_request_has_empty_args() {
        let req = Request::parse("/ls");
        assert_eq!(req.command(), Command::Ls);
        assert_eq!(req.args(), "");
        assert_eq!(req.text(), "/ls");
    }
}
