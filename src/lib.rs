pub mod categories;
pub mod cursor;
pub mod fetcher;
pub mod journal;
pub mod messenger;
pub mod normalizer;
pub mod preferences;
pub mod query;
pub mod reply;
pub mod router;
pub mod types;

pub use categories::{CategorySet, ARXIV_CATEGORIES};
pub use cursor::{next_callback, parse_callback, previous_callback, Cursor, NavCommand};
pub use fetcher::{FeedClient, Fetcher};
pub use journal::{ErrorKind, FileJournal, Journal, JournalEntry, PgJournal};
pub use messenger::{
    ChatId, MessageRef, Messenger, MessengerError, NavButton, NavControls, SendOptions,
};
pub use normalizer::{normalize, parse_payload, total_results};
pub use preferences::{FilePreferenceStore, PgPreferenceStore, PreferenceStore};
pub use query::{append_result_window, QueryBuilder, SearchFields};
pub use reply::{nav_state, split_by_budget, NavState, ReplyFormatter};
pub use router::{contains_emoji, ArxivBot, CallbackQuery, IncomingMessage};
pub use types::*;
