use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::categories::CategorySet;
use crate::messenger::MessengerError;

/// One search result in the shape shown to users, independent of which feed
/// dialect it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub year: Option<String>,
    pub link: Option<String>,
    /// Set for RSS entries whose raw title carries the `UPDATED` marker.
    /// Informational metadata, never rendered into the reply text.
    pub updated: bool,
}

impl CanonicalRecord {
    /// True when every rendered field is absent. Such records are dropped
    /// during normalization and never shown to a user.
    pub fn is_blank(&self) -> bool {
        self.title.is_none() && self.authors.is_none() && self.year.is_none() && self.link.is_none()
    }
}

/// Feed-level metadata pulled out of a parsed payload.
#[derive(Debug, Clone, Default)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    /// Raw `opensearch:totalResults` text. Present only on API payloads.
    pub total_results: Option<String>,
}

/// A parsed feed document before shape-specific normalization.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub meta: FeedMeta,
    pub entries: Vec<RawEntry>,
}

/// One feed entry with its fields kept as raw text.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    /// Atom payloads carry one element per author; RSS payloads carry a
    /// single element holding the whole comma-separated, anchor-wrapped list.
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub link: Option<String>,
}

/// Which external response dialect governs field extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedShape {
    Api,
    Rss,
}

impl FeedShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedShape::Api => "API",
            FeedShape::Rss => "RSS",
        }
    }
}

impl FromStr for FeedShape {
    type Err = BotError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "API" => Ok(FeedShape::Api),
            "RSS" => Ok(FeedShape::Rss),
            other => Err(BotError::UnsupportedShape(other.to_string())),
        }
    }
}

/// A window of canonical records plus the paging facts needed to render it.
///
/// `start_offset` is never negative and `page_size` is always positive for
/// pages produced by the bot flows.
#[derive(Debug, Clone)]
pub struct ResultPage {
    pub records: Vec<CanonicalRecord>,
    pub start_offset: i64,
    pub page_size: i64,
    /// Server-reported total for API payloads. `None` for RSS payloads,
    /// which never report one.
    pub total_results: Option<i64>,
}

impl ResultPage {
    /// The total used for trailers and navigation. Falls back to the record
    /// count when the feed shape reports no authoritative total.
    pub fn known_total(&self) -> i64 {
        self.total_results.unwrap_or(self.records.len() as i64)
    }
}

/// Constants governing query construction and reply formatting.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_base: String,
    pub rss_base: String,
    /// Results per page of an API search.
    pub page_size: i64,
    /// Cap on entries shown from one category feed.
    pub max_rss_results: usize,
    pub max_keywords: usize,
    pub max_authors: usize,
    /// Character cap of a single outbound message.
    pub char_budget: usize,
    /// Wait imposed after each call to the rate-limited search endpoint.
    pub fair_delay_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: "http://export.arxiv.org/api/query?search_query=".to_string(),
            rss_base: "http://arxiv.org/rss/".to_string(),
            page_size: 10,
            max_rss_results: 50,
            max_keywords: 10,
            max_authors: 5,
            char_budget: 4096,
            fair_delay_seconds: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "arxiv-bot/0.1".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Everything the bot needs beyond its collaborators.
#[derive(Debug, Clone, Default)]
pub struct BotConfig {
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub categories: CategorySet,
    /// Email address offered to users by the feedback command.
    pub feedback_address: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("The search query has no valid terms")]
    EmptyQuery,

    #[error("Unknown arXiv category: {category}")]
    InvalidCategory { category: String },

    #[error("The requested result count is negative")]
    NegativeCount,

    #[error("Invalid feed link {link}: {detail}")]
    InvalidLink { link: String, detail: String },

    #[error("Request to the feed endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("The feed endpoint answered with HTTP status {code}")]
    HttpStatus { code: u16 },

    #[error("Feed parse error: {0}")]
    MalformedPayload(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("The feed contains no usable entries")]
    NoResults,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported feed shape tag: {0}")]
    UnsupportedShape(String),

    #[error("The feed metadata lacks a required field: {0}")]
    MissingMetadata(String),

    #[error("The message text carries no recoverable search cursor")]
    MissingCursor,

    #[error("Malformed callback payload: {0}")]
    MalformedCallback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Messaging platform error: {0}")]
    Messenger(#[from] MessengerError),
}

impl BotError {
    /// Short variant name, used when journaling errors.
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::EmptyQuery => "EmptyQuery",
            BotError::InvalidCategory { .. } => "InvalidCategory",
            BotError::NegativeCount => "NegativeCount",
            BotError::InvalidLink { .. } => "InvalidLink",
            BotError::Transport(_) => "Transport",
            BotError::HttpStatus { .. } => "HttpStatus",
            BotError::MalformedPayload(_) => "MalformedPayload",
            BotError::InvalidArgument(_) => "InvalidArgument",
            BotError::NoResults => "NoResults",
            BotError::InvalidParameter(_) => "InvalidParameter",
            BotError::UnsupportedShape(_) => "UnsupportedShape",
            BotError::MissingMetadata(_) => "MissingMetadata",
            BotError::MissingCursor => "MissingCursor",
            BotError::MalformedCallback(_) => "MalformedCallback",
            BotError::Io(_) => "Io",
            BotError::Serialization(_) => "Serialization",
            BotError::Database(_) => "Database",
            BotError::Messenger(_) => "Messenger",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
