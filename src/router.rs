use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::cursor::{parse_callback, Cursor, NavCommand};
use crate::fetcher::FeedClient;
use crate::journal::{ErrorKind, Journal};
use crate::messenger::{
    ChatId, MessageRef, Messenger, MessengerError, NavControls, SendOptions,
};
use crate::normalizer::{normalize, parse_payload, total_results};
use crate::preferences::PreferenceStore;
use crate::query::QueryBuilder;
use crate::reply::ReplyFormatter;
use crate::types::{BotConfig, BotError, CanonicalRecord, FeedShape, Result, ResultPage};

const UNKNOWN_APOLOGY: &str = "An unknown error occurred. \u{1F631}";
const TECHNICAL_APOLOGY: &str = "We are experiencing some technical problems, sorry!";
const DATABASE_APOLOGY: &str = "We are experiencing some issues with our database. Sorry!";
const RATE_LIMIT_APOLOGY: &str = "You can only make 20 requests per minutes. Please try later!";
const PLATFORM_APOLOGY: &str =
    "The messaging platform is messing around with the results, we'll have a look into this. Sorry!";
const NO_SUBMISSIONS_APOLOGY: &str =
    "There are no submissions to your favourite category today, try tomorrow!";
const SUBJECTS_APOLOGY: &str =
    "Please use the arXiv subjects.\nSee http://arxitics.com/help/categories for further information.";

/// One inbound chat message, as delivered by the platform adapter.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    /// Platform content type. Only `text` messages are served.
    pub content_kind: String,
    pub text: Option<String>,
}

/// One button press on a previously sent result message.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub interaction_id: i64,
    /// The result message whose button was pressed.
    pub message: MessageRef,
    /// Displayed text of that message. Carries the search cursor.
    pub message_text: String,
    pub data: String,
}

/// The bot itself. Dispatches commands and button presses to the search,
/// daily-feed, preference, feedback and help flows.
///
/// All collaborators are traits, so the bot runs against any chat platform
/// and any storage backend, and tests run it fully in memory.
pub struct ArxivBot<M, P, J, F> {
    messenger: M,
    preferences: P,
    journal: J,
    feed: F,
    config: BotConfig,
    query: QueryBuilder,
    formatter: ReplyFormatter,
}

impl<M, P, J, F> ArxivBot<M, P, J, F>
where
    M: Messenger,
    P: PreferenceStore,
    J: Journal,
    F: FeedClient,
{
    pub fn new(messenger: M, preferences: P, journal: J, feed: F, config: BotConfig) -> Self {
        let query = QueryBuilder::new(&config.search, config.categories.clone());
        let formatter = ReplyFormatter::new(&config.search);
        Self {
            messenger,
            preferences,
            journal,
            feed,
            config,
            query,
            formatter,
        }
    }

    /// Serves one chat message. Every failure ends in an apology to the
    /// user rather than an error to the caller.
    pub async fn handle_message(&self, message: &IncomingMessage) {
        let chat = message.chat_id;
        debug!("Received {} message from chat {}", message.content_kind, chat);

        let text = match message.text.as_deref() {
            Some(text) if message.content_kind == "text" => text,
            _ => {
                self.send_plain(chat, "You can only send me text messages, sorry!")
                    .await;
                return;
            }
        };

        if let Err(e) = self
            .journal
            .record_message(chat, &message.content_kind, text, None)
            .await
        {
            self.report_store_failure(chat, e, "journal::record_message")
                .await;
            return;
        }

        if contains_emoji(text) {
            self.send_plain(
                chat,
                "You have used an invalid unicode character. Unacceptable! \u{1F624}",
            )
            .await;
            return;
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.split_first() {
            Some((&"/search", args)) => self.do_search_chat(args, chat).await,
            Some((&"/set", [category])) => self.set_category(category, chat).await,
            Some((&"/today", [])) => self.do_today_with_preference(chat).await,
            Some((&"/today", [category])) => self.do_today(category, chat).await,
            Some((&"/feedback", args)) => self.give_feedback(args, chat).await,
            Some((&"/help", [])) => self.send_help(chat).await,
            _ => {
                self.send_plain(chat, "See the /help for information on this Bot!")
                    .await;
            }
        }
    }

    /// Serves one button press on a result message.
    pub async fn handle_callback(&self, query: &CallbackQuery) {
        let chat = query.message.chat_id;
        debug!("Received callback '{}' from chat {}", query.data, chat);

        if let Err(e) = self
            .journal
            .record_message(chat, "callback", &query.data, Some(query.interaction_id))
            .await
        {
            self.report_store_failure(chat, e, "journal::record_message")
                .await;
            return;
        }

        let command = match parse_callback(&query.data) {
            Ok(command) => command,
            Err(e) => {
                self.send_plain(chat, TECHNICAL_APOLOGY).await;
                self.journal_known(chat, &format!("{} - {}", e.kind(), e))
                    .await;
                return;
            }
        };

        match command {
            NavCommand::Close => {
                if let Err(e) = self.messenger.remove_controls(query.message).await {
                    warn!("Failed to remove controls from a closed result: {}", e);
                    self.journal_unknown(chat, "messenger::remove_controls")
                        .await;
                }
            }
            NavCommand::Page { start } => {
                let cursor = match Cursor::recover(&query.message_text, start) {
                    Ok(cursor) => cursor,
                    Err(e) => {
                        self.send_plain(chat, TECHNICAL_APOLOGY).await;
                        self.journal_known(chat, &format!("{} - {}", e.kind(), e))
                            .await;
                        return;
                    }
                };
                self.do_search_page(&cursor.keywords, start, chat, query.interaction_id, query.message)
                    .await;
            }
        }
    }

    /// The `/search` command. Fetches the first result page and delivers it
    /// as a fresh message, with navigation buttons when more pages exist.
    async fn do_search_chat(&self, keywords: &[&str], chat: ChatId) {
        if keywords.len() > self.config.search.max_keywords {
            let message = format!(
                "Please use less than {} keywords for your search.",
                self.config.search.max_keywords
            );
            self.send_plain(chat, &message).await;
            return;
        }

        let link = match self
            .query
            .keyword_query(keywords, 0, self.config.search.page_size)
        {
            Ok(link) => link,
            Err(BotError::EmptyQuery) => {
                self.send_plain(chat, "Please provide some arguments for your arXiv search.")
                    .await;
                return;
            }
            Err(_) => {
                self.send_plain(chat, UNKNOWN_APOLOGY).await;
                self.journal_unknown(chat, "query::keyword_query").await;
                return;
            }
        };

        let page = match self.fetch_search_page(&link, 0).await {
            Ok(page) => page,
            Err(e) => {
                self.report_failure(chat, &e, FeedShape::Api).await;
                return;
            }
        };

        let cursor = Cursor::new(keywords.iter().copied(), 0);
        let message = self.formatter.format_search_page(&cursor, &page);

        let total = page.known_total();
        if total <= self.config.search.page_size {
            self.send_message_safely(chat, &message, None).await;
        } else {
            let controls = self.formatter.search_controls(0, total);
            self.send_message_safely(chat, &message, Some(controls)).await;
        }

        sleep(Duration::from_secs(self.config.search.fair_delay_seconds)).await;
    }

    /// One pagination step. Edits the existing result message in place and
    /// settles the button press.
    async fn do_search_page(
        &self,
        keywords: &[String],
        start: i64,
        chat: ChatId,
        interaction_id: i64,
        message: MessageRef,
    ) {
        let link = match self
            .query
            .keyword_query(keywords, start, self.config.search.page_size)
        {
            Ok(link) => link,
            Err(BotError::EmptyQuery) => {
                self.send_plain(chat, "Please provide some arguments for the search.")
                    .await;
                return;
            }
            Err(_) => {
                self.send_plain(chat, UNKNOWN_APOLOGY).await;
                self.journal_unknown(chat, "query::keyword_query").await;
                return;
            }
        };

        let page = match self.fetch_search_page(&link, start).await {
            Ok(page) => page,
            Err(e) => {
                self.report_failure(chat, &e, FeedShape::Api).await;
                return;
            }
        };

        let cursor = Cursor::new(keywords.iter().cloned(), start);
        let text = self.formatter.format_search_page(&cursor, &page);
        let controls = self.formatter.search_controls(start, page.known_total());
        self.edit_message_safely(message, &text, controls, interaction_id)
            .await;

        sleep(Duration::from_secs(self.config.search.fair_delay_seconds)).await;
    }

    /// The `/set` command.
    async fn set_category(&self, category: &str, chat: ChatId) {
        if !self.query.categories().contains(category) {
            self.send_message_safely(chat, SUBJECTS_APOLOGY, None).await;
            return;
        }

        let existing = match self.preferences.get(chat).await {
            Ok(existing) => existing,
            Err(e) => {
                self.report_store_failure(chat, e, "preferences::get").await;
                return;
            }
        };

        if let Err(e) = self.preferences.set(chat, category).await {
            self.report_store_failure(chat, e, "preferences::set").await;
            return;
        }

        let reply = if existing.is_some() {
            "Your preferred category has been updated!\nNow use /today to get the daily submissions to this category."
        } else {
            "Your preferred category has been recorded!\nNow use /today to get the daily submissions to this category."
        };
        self.send_message_safely(chat, reply, None).await;
    }

    /// The bare `/today` command, served from the stored preference.
    async fn do_today_with_preference(&self, chat: ChatId) {
        match self.preferences.get(chat).await {
            Ok(Some(category)) => self.do_today(&category, chat).await,
            Ok(None) => {
                let message = "You have not /set your favourite arXiv category. \
                               Please set your favourite category with\n    <i>/set favourite_category</i>\n\
                               or specify the category you are interested in with\n    <i>/today arxiv_category</i>\n";
                self.send_message_safely(chat, message, None).await;
            }
            Err(BotError::Database(e)) => {
                self.send_plain(chat, DATABASE_APOLOGY).await;
                self.journal_known(chat, &format!("Database - {}", e)).await;
            }
            Err(_) => {
                self.send_plain(
                    chat,
                    "An unknown error occurred while checking your preferences. \u{1F631}",
                )
                .await;
                self.journal_unknown(chat, "preferences::get").await;
            }
        }
    }

    /// The `/today <category>` command. Entries updated rather than newly
    /// submitted are left out of the listing.
    async fn do_today(&self, category: &str, chat: ChatId) {
        let link = match self.query.category_feed_url(category) {
            Ok(link) => link,
            Err(BotError::InvalidCategory { .. }) => {
                self.send_message_safely(chat, SUBJECTS_APOLOGY, None).await;
                return;
            }
            Err(_) => {
                self.send_plain(chat, UNKNOWN_APOLOGY).await;
                self.journal_unknown(chat, "query::category_feed_url").await;
                return;
            }
        };

        let (records, feed_date) = match self.fetch_today_feed(&link).await {
            Ok(result) => result,
            Err(e) => {
                self.report_failure(chat, &e, FeedShape::Rss).await;
                return;
            }
        };

        let fresh: Vec<CanonicalRecord> = records.into_iter().filter(|r| !r.updated).collect();
        if fresh.is_empty() {
            self.send_plain(chat, NO_SUBMISSIONS_APOLOGY).await;
            return;
        }

        let total = fresh.len() as i64;
        let shown = &fresh[..fresh.len().min(self.config.search.max_rss_results)];
        let remaining = total - self.config.search.max_rss_results as i64;

        let pages = self
            .formatter
            .format_today_pages(category, feed_date, shown, remaining);
        for page in &pages {
            if !self.send_message_safely(chat, page, None).await {
                return;
            }
        }
    }

    /// The `/feedback` command.
    async fn give_feedback(&self, args: &[&str], chat: ChatId) {
        if args.is_empty() {
            let prompt = format!(
                "We are always happy to hear your view! \u{1F4E3}\n\nUse /feedback <i>your comment</i>\nor email us at {}",
                self.config.feedback_address
            );
            self.send_message_safely(chat, &prompt, None).await;
            return;
        }

        let comment = args.join(" ");
        if let Err(e) = self.journal.record_feedback(chat, &comment).await {
            self.report_store_failure(chat, e, "journal::record_feedback")
                .await;
            return;
        }

        self.send_message_safely(chat, "Thanks for your feedback! \u{1F604}", None)
            .await;
    }

    /// The `/help` command. The example category is picked from the chat
    /// identity, so any given user always sees the same one.
    async fn send_help(&self, chat: ChatId) {
        let categories = self.query.categories();
        let index = if categories.is_empty() {
            0
        } else {
            chat.unsigned_abs() as usize % categories.len()
        };

        let example = match categories.get(index) {
            Ok(example) => example,
            Err(e) => {
                self.send_plain(chat, TECHNICAL_APOLOGY).await;
                self.journal_known(chat, &format!("{} - {}", e.kind(), e))
                    .await;
                return;
            }
        };

        let message = format!(
            "Search for papers on the arXiv with this bot. Search papers using some keywords, \
             or check the new submissions to your favourite category, and share the results easily. \
             With ArXivBot you can\n\n- make a /search using some keywords\n    <i>e.g. /search atom 2017</i>\n\n\
             - look at what's going on /today in the arXiv\n    <i>e.g. /today {example}</i>\n\n\
             - /set your favourite arXiv category\n    <i>e.g. /set {example}</i>\n           <i>/today</i>\n\n\
             - send us your /feedback\n    <i>e.g. /feedback I like this bot!</i>\n\nEnjoy your search! \u{1F609}"
        );
        self.send_message_safely(chat, &message, None).await;
    }

    /// Runs the full API pipeline behind one search page.
    async fn fetch_search_page(&self, link: &str, start: i64) -> Result<ResultPage> {
        let payload = self.feed.fetch(link).await?;
        let parsed = parse_payload(&payload)?;
        let records = normalize(&parsed, FeedShape::Api, self.config.search.max_authors)?;
        let total = total_results(&parsed)?;

        Ok(ResultPage {
            records,
            start_offset: start,
            page_size: self.config.search.page_size,
            total_results: Some(total),
        })
    }

    /// Runs the full RSS pipeline behind one daily listing.
    async fn fetch_today_feed(&self, link: &str) -> Result<(Vec<CanonicalRecord>, DateTime<Utc>)> {
        let payload = self.feed.fetch(link).await?;
        let parsed = parse_payload(&payload)?;
        let records = normalize(&parsed, FeedShape::Rss, self.config.search.max_authors)?;
        let feed_date = parsed
            .meta
            .updated
            .ok_or_else(|| BotError::MissingMetadata("the feed reports no update date".to_string()))?;

        Ok((records, feed_date))
    }

    /// Maps a pipeline failure to its user apology and journals it.
    /// Empty results are normal traffic and stay out of the journal.
    async fn report_failure(&self, chat: ChatId, err: &BotError, shape: FeedShape) {
        let apology = match (err, shape) {
            (BotError::NoResults, FeedShape::Api) => {
                "No result has been found for your search. Try again!"
            }
            (BotError::NoResults, FeedShape::Rss) => NO_SUBMISSIONS_APOLOGY,
            (BotError::InvalidLink { .. }, _) => "The url got corrupted. Try again!",
            (BotError::Transport(_), _) => {
                "The search arguments are fine, but the search on the arXiv failed."
            }
            (BotError::HttpStatus { .. }, _) => {
                "We are currently experiencing connection problems, sorry!"
            }
            (
                BotError::MalformedPayload(_)
                | BotError::InvalidArgument(_)
                | BotError::MissingMetadata(_),
                _,
            ) => "The result of the search got corrupted.",
            (
                BotError::InvalidParameter(_)
                | BotError::UnsupportedShape(_)
                | BotError::MalformedCallback(_)
                | BotError::MissingCursor,
                _,
            ) => TECHNICAL_APOLOGY,
            (BotError::Database(_), _) => DATABASE_APOLOGY,
            _ => UNKNOWN_APOLOGY,
        };

        self.send_plain(chat, apology).await;

        match err {
            BotError::NoResults => {}
            BotError::InvalidLink { .. }
            | BotError::Transport(_)
            | BotError::HttpStatus { .. }
            | BotError::MalformedPayload(_)
            | BotError::InvalidArgument(_)
            | BotError::MissingMetadata(_)
            | BotError::InvalidParameter(_)
            | BotError::UnsupportedShape(_)
            | BotError::MalformedCallback(_)
            | BotError::MissingCursor
            | BotError::Database(_) => {
                self.journal_known(chat, &format!("{} - {}", err.kind(), err))
                    .await;
            }
            _ => {
                self.journal_unknown(chat, "router::report_failure").await;
            }
        }
    }

    /// Maps a journaling or preference-store failure to its user apology.
    async fn report_store_failure(&self, chat: ChatId, err: BotError, context: &str) {
        match err {
            BotError::Database(e) => {
                self.send_plain(chat, DATABASE_APOLOGY).await;
                self.journal_known(chat, &format!("Database - {}", e)).await;
            }
            _ => {
                self.send_plain(chat, UNKNOWN_APOLOGY).await;
                self.journal_unknown(chat, context).await;
            }
        }
    }

    /// Fire-and-forget notice. Delivery failures are only logged, since the
    /// notice itself is usually the error report.
    async fn send_plain(&self, chat: ChatId, text: &str) {
        if let Err(e) = self
            .messenger
            .send_text(chat, text, SendOptions::default())
            .await
        {
            warn!("Failed to deliver a notice to chat {}: {}", chat, e);
        }
    }

    /// Sends a rich-text message, translating platform failures into user
    /// apologies. Returns whether the message went out.
    async fn send_message_safely(
        &self,
        chat: ChatId,
        text: &str,
        controls: Option<NavControls>,
    ) -> bool {
        let options = match controls {
            Some(controls) => SendOptions::rich_with(controls),
            None => SendOptions::rich(),
        };

        match self.messenger.send_text(chat, text, options).await {
            Ok(_) => true,
            Err(MessengerError::TooManyRequests) => {
                self.send_plain(chat, RATE_LIMIT_APOLOGY).await;
                false
            }
            Err(MessengerError::Platform(detail)) => {
                self.send_plain(chat, PLATFORM_APOLOGY).await;
                self.journal_known(chat, &format!("Messenger - {}", detail))
                    .await;
                false
            }
        }
    }

    /// Edits a result message in place and settles the button press, with
    /// failures reported through the press notice.
    async fn edit_message_safely(
        &self,
        message: MessageRef,
        text: &str,
        controls: NavControls,
        interaction_id: i64,
    ) {
        match self
            .messenger
            .edit_text(message, text, SendOptions::rich_with(controls))
            .await
        {
            Ok(()) => {
                self.acknowledge_robustly(message.chat_id, interaction_id, None)
                    .await;
            }
            Err(MessengerError::TooManyRequests) => {
                self.acknowledge_robustly(message.chat_id, interaction_id, Some(RATE_LIMIT_APOLOGY))
                    .await;
            }
            Err(MessengerError::Platform(detail)) => {
                self.acknowledge_robustly(
                    message.chat_id,
                    interaction_id,
                    Some("You are probably clicking the buttons too quickly. Slow down! \u{1F422}"),
                )
                .await;
                self.journal_known(message.chat_id, &format!("Messenger - {}", detail))
                    .await;
            }
        }
    }

    async fn acknowledge_robustly(&self, chat: ChatId, interaction_id: i64, notice: Option<&str>) {
        if let Err(e) = self.messenger.acknowledge(interaction_id, notice).await {
            warn!("Failed to acknowledge interaction {}: {}", interaction_id, e);
            self.journal_unknown(chat, "messenger::acknowledge").await;
        }
    }

    async fn journal_known(&self, chat: ChatId, details: &str) {
        if let Err(e) = self
            .journal
            .record_error(chat, ErrorKind::Known, details)
            .await
        {
            error!("Failed to journal a known error for chat {}: {}", chat, e);
        }
    }

    async fn journal_unknown(&self, chat: ChatId, context: &str) {
        let details = format!("Error occurred in {}", context);
        if let Err(e) = self
            .journal
            .record_error(chat, ErrorKind::Unknown, &details)
            .await
        {
            error!("Failed to journal an unknown error for chat {}: {}", chat, e);
        }
    }
}

/// True when the text carries any scalar from the emoji blocks the bot
/// rejects, including the variation selector that emoji-styles a preceding
/// character.
pub fn contains_emoji(text: &str) -> bool {
    text.chars().any(|ch| {
        matches!(ch as u32,
            0x1F300..=0x1F5FF
                | 0x1F600..=0x1F64F
                | 0x1F680..=0x1F6FF
                | 0x1F900..=0x1F9FF
                | 0x1FA70..=0x1FAFF
                | 0x1F1E6..=0x1F1FF
                | 0x2600..=0x26FF
                | 0x2700..=0x27BF
                | 0xFE0F
        )
    })
}
