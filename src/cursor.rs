use serde::{Deserialize, Serialize};

use crate::types::{BotError, Result};

/// Lines wrapping the keyword echo at the top of every search reply. The
/// cursor is recovered from the displayed text between them, so the reply
/// body must never reproduce either marker.
pub const KEYWORDS_PREFIX: &str = "Your search keywords are:\n";
pub const KEYWORDS_SUFFIX: &str = "\n\n";

/// Callback payload of the button that retires a result message.
pub const CALLBACK_CLOSE: &str = "search close None";

/// Where a user stands in a paginated search. Persisted inside the reply
/// text itself rather than in server-side session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub keywords: Vec<String>,
    pub start: i64,
}

impl Cursor {
    pub fn new<I, S>(keywords: I, start: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            start,
        }
    }

    /// The echo block opening a search reply. Recovery relies on this exact
    /// framing.
    pub fn echo_block(&self) -> String {
        format!(
            "{}{}{}",
            KEYWORDS_PREFIX,
            self.keywords.join(" "),
            KEYWORDS_SUFFIX
        )
    }

    /// Reads the keywords back out of a previously sent reply text.
    pub fn recover(text: &str, start: i64) -> Result<Self> {
        let after = text
            .find(KEYWORDS_PREFIX)
            .map(|idx| &text[idx + KEYWORDS_PREFIX.len()..])
            .ok_or(BotError::MissingCursor)?;
        let end = after.find(KEYWORDS_SUFFIX).ok_or(BotError::MissingCursor)?;

        let keywords = after[..end]
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Ok(Self { keywords, start })
    }
}

/// A decoded navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Close,
    Page { start: i64 },
}

pub fn previous_callback(start: i64) -> String {
    format!("search previous {}", start)
}

pub fn next_callback(start: i64) -> String {
    format!("search next {}", start)
}

/// Decodes a button callback payload.
///
/// The payload format is `search <action> <argument>` with exactly three
/// tokens. Anything else is rejected, including well-formed payloads from
/// scopes this bot never emits.
pub fn parse_callback(data: &str) -> Result<NavCommand> {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(BotError::MalformedCallback(format!(
            "expected three tokens, got {}",
            tokens.len()
        )));
    }
    if tokens[0] != "search" {
        return Err(BotError::MalformedCallback(format!(
            "unknown scope '{}'",
            tokens[0]
        )));
    }

    match tokens[1] {
        "close" => Ok(NavCommand::Close),
        "previous" | "next" => tokens[2]
            .parse::<i64>()
            .map(|start| NavCommand::Page { start })
            .map_err(|_| {
                BotError::MalformedCallback(format!("offset '{}' is not an integer", tokens[2]))
            }),
        other => Err(BotError::MalformedCallback(format!(
            "unknown action '{}'",
            other
        ))),
    }
}
