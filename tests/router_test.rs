use arxiv_bot::{
    ArxivBot, BotConfig, BotError, CallbackQuery, CategorySet, Cursor, ErrorKind, FeedClient,
    IncomingMessage, Journal, MessageRef, Messenger, MessengerError, NavControls,
    PreferenceStore, Result, SearchConfig, SendOptions,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Once};
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

#[derive(Debug, Clone)]
struct SentMessage {
    chat: i64,
    text: String,
    rich: bool,
    controls: Option<NavControls>,
}

#[derive(Default)]
struct MessengerState {
    sent: Vec<SentMessage>,
    edits: Vec<(MessageRef, String, Option<NavControls>)>,
    acks: Vec<(i64, Option<String>)>,
    removed: Vec<MessageRef>,
    fail_sends: Vec<MessengerError>,
    fail_edits: Vec<MessengerError>,
}

/// Records every platform call; failures can be queued up front.
#[derive(Clone, Default)]
struct RecordingMessenger {
    state: Arc<Mutex<MessengerState>>,
    next_message_id: Arc<AtomicI64>,
}

impl RecordingMessenger {
    fn fail_next_send(&self, err: MessengerError) {
        self.state.lock().unwrap().fail_sends.push(err);
    }

    fn fail_next_edit(&self, err: MessengerError) {
        self.state.lock().unwrap().fail_edits.push(err);
    }

    fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    fn edits(&self) -> Vec<(MessageRef, String, Option<NavControls>)> {
        self.state.lock().unwrap().edits.clone()
    }

    fn acks(&self) -> Vec<(i64, Option<String>)> {
        self.state.lock().unwrap().acks.clone()
    }

    fn removed(&self) -> Vec<MessageRef> {
        self.state.lock().unwrap().removed.clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> std::result::Result<MessageRef, MessengerError> {
        let mut state = self.state.lock().unwrap();
        if !state.fail_sends.is_empty() {
            return Err(state.fail_sends.remove(0));
        }
        state.sent.push(SentMessage {
            chat: chat_id,
            text: text.to_string(),
            rich: options.rich_text,
            controls: options.controls,
        });
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef {
            chat_id,
            message_id,
        })
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        options: SendOptions,
    ) -> std::result::Result<(), MessengerError> {
        let mut state = self.state.lock().unwrap();
        if !state.fail_edits.is_empty() {
            return Err(state.fail_edits.remove(0));
        }
        state.edits.push((message, text.to_string(), options.controls));
        Ok(())
    }

    async fn acknowledge(
        &self,
        interaction_id: i64,
        notice: Option<&str>,
    ) -> std::result::Result<(), MessengerError> {
        self.state
            .lock()
            .unwrap()
            .acks
            .push((interaction_id, notice.map(str::to_string)));
        Ok(())
    }

    async fn remove_controls(&self, message: MessageRef) -> std::result::Result<(), MessengerError> {
        self.state.lock().unwrap().removed.push(message);
        Ok(())
    }
}

/// Serves one canned payload and records the requested links.
#[derive(Clone)]
struct StubFeedClient {
    payload: std::result::Result<String, u16>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubFeedClient {
    fn with_payload(payload: String) -> Self {
        Self {
            payload: Ok(payload),
            requests: Arc::default(),
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            payload: Err(status),
            requests: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedClient for StubFeedClient {
    async fn fetch(&self, link: &str) -> Result<String> {
        self.requests.lock().unwrap().push(link.to_string());
        match &self.payload {
            Ok(payload) => Ok(payload.clone()),
            Err(code) => Err(BotError::HttpStatus { code: *code }),
        }
    }
}

#[derive(Clone, Default)]
struct MemoryPreferenceStore {
    map: Arc<Mutex<HashMap<i64, String>>>,
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, user: i64) -> Result<Option<String>> {
        Ok(self.map.lock().unwrap().get(&user).cloned())
    }

    async fn set(&self, user: i64, category: &str) -> Result<()> {
        self.map.lock().unwrap().insert(user, category.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum JournalRecord {
    Message {
        kind: String,
        content: String,
        interaction: Option<i64>,
    },
    Feedback {
        comment: String,
    },
    Error {
        kind: String,
        details: String,
    },
}

#[derive(Clone, Default)]
struct MemoryJournal {
    entries: Arc<Mutex<Vec<JournalRecord>>>,
    fail_messages: Arc<AtomicBool>,
}

impl MemoryJournal {
    fn failing_messages() -> Self {
        let journal = Self::default();
        journal.fail_messages.store(true, Ordering::SeqCst);
        journal
    }

    fn entries(&self) -> Vec<JournalRecord> {
        self.entries.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<(String, String)> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                JournalRecord::Error { kind, details } => Some((kind, details)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn record_message(
        &self,
        _user: i64,
        kind: &str,
        content: &str,
        interaction: Option<i64>,
    ) -> Result<()> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(BotError::Database(sqlx::Error::PoolClosed));
        }
        self.entries.lock().unwrap().push(JournalRecord::Message {
            kind: kind.to_string(),
            content: content.to_string(),
            interaction,
        });
        Ok(())
    }

    async fn record_feedback(&self, _user: i64, comment: &str) -> Result<()> {
        self.entries.lock().unwrap().push(JournalRecord::Feedback {
            comment: comment.to_string(),
        });
        Ok(())
    }

    async fn record_error(&self, _user: i64, kind: ErrorKind, details: &str) -> Result<()> {
        self.entries.lock().unwrap().push(JournalRecord::Error {
            kind: kind.as_str().to_string(),
            details: details.to_string(),
        });
        Ok(())
    }
}

type TestableBot = ArxivBot<RecordingMessenger, MemoryPreferenceStore, MemoryJournal, StubFeedClient>;

struct Harness {
    bot: TestableBot,
    messenger: RecordingMessenger,
    preferences: MemoryPreferenceStore,
    journal: MemoryJournal,
    feed: StubFeedClient,
}

fn test_config() -> BotConfig {
    BotConfig {
        search: SearchConfig {
            max_keywords: 3,
            fair_delay_seconds: 0,
            ..SearchConfig::default()
        },
        categories: CategorySet::from_tags(["cs.AI", "math.DS", "quant-ph"]),
        feedback_address: "arxivbot@example.com".to_string(),
        ..BotConfig::default()
    }
}

fn harness(feed: StubFeedClient) -> Harness {
    harness_with(feed, MemoryJournal::default(), test_config())
}

fn harness_with(feed: StubFeedClient, journal: MemoryJournal, config: BotConfig) -> Harness {
    let messenger = RecordingMessenger::default();
    let preferences = MemoryPreferenceStore::default();
    let bot = ArxivBot::new(
        messenger.clone(),
        preferences.clone(),
        journal.clone(),
        feed.clone(),
        config,
    );
    Harness {
        bot,
        messenger,
        preferences,
        journal,
        feed,
    }
}

fn text_message(chat: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: chat,
        content_kind: "text".to_string(),
        text: Some(text.to_string()),
    }
}

fn callback(chat: i64, interaction: i64, data: &str, message_text: &str) -> CallbackQuery {
    CallbackQuery {
        interaction_id: interaction,
        message: MessageRef {
            chat_id: chat,
            message_id: 400,
        },
        message_text: message_text.to_string(),
        data: data.to_string(),
    }
}

fn api_payload(total: i64, titles: &[&str]) -> String {
    let entries: String = titles
        .iter()
        .enumerate()
        .map(|(idx, title)| {
            format!(
                "<entry>\n<id>http://arxiv.org/abs/1707.0{}v1</id>\n\
                 <title>{}</title>\n\
                 <published>2017-07-10T00:00:00Z</published>\n\
                 <author><name>Mario Rossi</name></author>\n\
                 <link href=\"http://arxiv.org/abs/1707.0{}\"/>\n</entry>\n",
                1000 + idx,
                title,
                1000 + idx
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <feed xmlns=\"http://www.w3.org/2005/Atom\" xmlns:opensearch=\"http://a9.com/-/spec/opensearch/1.1/\">\n\
         <title>ArXiv Query</title>\n\
         <id>http://arxiv.org/api/query</id>\n\
         <updated>2017-07-19T00:00:00Z</updated>\n\
         <opensearch:totalResults>{}</opensearch:totalResults>\n\
         {}</feed>",
        total, entries
    )
}

fn rss_payload(fresh: &[&str], updated: &[&str]) -> String {
    let mut items = String::new();
    for title in fresh {
        items.push_str(&format!(
            "<item>\n<title>{}. (arXiv:0000.00000v1 [cs.AI])</title>\n\
             <link>http://arxiv.org/abs/0000.00000</link>\n\
             <author>&lt;a href=\"http://arxiv.org/a/rossi_m_1\"&gt;Mario Rossi&lt;/a&gt;</author>\n\
             </item>\n",
            title
        ));
    }
    for title in updated {
        items.push_str(&format!(
            "<item>\n<title>{}. (arXiv:0000.00001v2 [cs.AI] UPDATED)</title>\n\
             <link>http://arxiv.org/abs/0000.00001</link>\n\
             <author>&lt;a href=\"http://arxiv.org/a/verdi_g_1\"&gt;Gianni Verdi&lt;/a&gt;</author>\n\
             </item>\n",
            title
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <rss version=\"2.0\">\n<channel>\n\
         <title>cs.AI updates on arXiv.org</title>\n\
         <link>http://arxiv.org/</link>\n\
         <description>Computer Science -- Artificial Intelligence</description>\n\
         <lastBuildDate>Tue, 18 Jul 2017 20:30:00 GMT</lastBuildDate>\n\
         {}</channel>\n</rss>",
        items
    )
}

#[tokio::test]
async fn test_non_text_messages_get_a_notice() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    let message = IncomingMessage {
        chat_id: 7,
        content_kind: "photo".to_string(),
        text: None,
    };
    h.bot.handle_message(&message).await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "You can only send me text messages, sorry!");
    assert!(h.journal.entries().is_empty());
}

#[tokio::test]
async fn test_text_messages_are_journaled() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot.handle_message(&text_message(7, "hello there")).await;

    assert_eq!(
        h.journal.entries(),
        vec![JournalRecord::Message {
            kind: "text".to_string(),
            content: "hello there".to_string(),
            interaction: None,
        }]
    );
    assert_eq!(
        h.messenger.sent()[0].text,
        "See the /help for information on this Bot!"
    );
}

#[tokio::test]
async fn test_emoji_messages_are_rejected() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_message(&text_message(7, "/search atom \u{1F600}"))
        .await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        "You have used an invalid unicode character. Unacceptable! \u{1F624}"
    );
    assert!(h.feed.requests().is_empty());
}

#[tokio::test]
async fn test_search_sends_the_first_page_with_controls() {
    init_tracing();
    info!("Testing the full search flow");

    let h = harness(StubFeedClient::with_payload(api_payload(
        25,
        &["First paper", "Second paper"],
    )));
    h.bot
        .handle_message(&text_message(7, "/search atom laser"))
        .await;

    assert_eq!(
        h.feed.requests(),
        vec![
            "http://export.arxiv.org/api/query?search_query=all:atom+AND+all:laser&start=0&max_results=10"
                .to_string()
        ]
    );

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].rich);
    assert!(sent[0].text.starts_with("Your search keywords are:\natom laser\n\n"));
    assert!(sent[0].text.contains("<b>1</b>. <em>First paper</em>"));
    assert!(sent[0].text.contains("<b>2</b>. <em>Second paper</em>"));
    assert!(sent[0]
        .text
        .ends_with("There are 25 results associated with this search."));

    let controls = sent[0].controls.as_ref().unwrap();
    let labels: Vec<&str> = controls.buttons.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["Close", "Next"]);
}

#[tokio::test]
async fn test_single_page_results_come_without_controls() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(api_payload(2, &["Only", "Two"])));

    h.bot.handle_message(&text_message(7, "/search atom")).await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].controls.is_none());
    assert!(!sent[0].text.contains("results associated with this search"));
}

#[tokio::test]
async fn test_search_without_arguments_asks_for_them() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot.handle_message(&text_message(7, "/search")).await;

    let sent = h.messenger.sent();
    assert_eq!(sent[0].text, "Please provide some arguments for your arXiv search.");
    assert!(!sent[0].rich);
    assert!(h.feed.requests().is_empty());
}

#[tokio::test]
async fn test_search_rejects_too_many_keywords() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_message(&text_message(7, "/search one two three four"))
        .await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "Please use less than 3 keywords for your search."
    );
    assert!(h.feed.requests().is_empty());
}

#[tokio::test]
async fn test_http_failures_map_to_the_connection_apology() {
    init_tracing();
    let h = harness(StubFeedClient::failing(503));

    h.bot.handle_message(&text_message(7, "/search atom")).await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "We are currently experiencing connection problems, sorry!"
    );
    let errors = h.journal.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "known");
    assert!(errors[0].1.contains("HttpStatus"));
}

#[tokio::test]
async fn test_empty_results_are_reported_without_journaling() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(api_payload(0, &[])));

    h.bot.handle_message(&text_message(7, "/search atom")).await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "No result has been found for your search. Try again!"
    );
    assert!(h.journal.errors().is_empty());
}

#[tokio::test]
async fn test_callback_next_edits_the_message_in_place() {
    init_tracing();
    info!("Testing the pagination flow");

    let h = harness(StubFeedClient::with_payload(api_payload(
        25,
        &["Eleventh", "Twelfth"],
    )));

    let message_text = format!("{}<b>1</b>. <em>Old page</em>\n\n", Cursor::new(["atom", "laser"], 0).echo_block());
    h.bot
        .handle_callback(&callback(7, 55, "search next 10", &message_text))
        .await;

    assert!(h.feed.requests()[0].contains("&start=10&max_results=10"));

    let edits = h.messenger.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0.message_id, 400);
    assert!(edits[0].1.starts_with("Your search keywords are:\natom laser\n\n"));
    assert!(edits[0].1.contains("<b>11</b>. <em>Eleventh</em>"));
    assert!(edits[0].1.contains("<b>12</b>. <em>Twelfth</em>"));

    let controls = edits[0].2.as_ref().unwrap();
    let labels: Vec<&str> = controls.buttons.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["Close", "Prev", "Next"]);

    assert_eq!(h.messenger.acks(), vec![(55, None)]);
    assert!(h
        .journal
        .entries()
        .contains(&JournalRecord::Message {
            kind: "callback".to_string(),
            content: "search next 10".to_string(),
            interaction: Some(55),
        }));
}

#[tokio::test]
async fn test_callback_close_removes_the_controls() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_callback(&callback(7, 55, "search close None", "whatever"))
        .await;

    let removed = h.messenger.removed();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].message_id, 400);
    assert!(h.messenger.edits().is_empty());
    assert!(h.feed.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_callbacks_get_a_technical_apology() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_callback(&callback(7, 55, "search sideways 10", "whatever"))
        .await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "We are experiencing some technical problems, sorry!"
    );
    let errors = h.journal.errors();
    assert_eq!(errors[0].0, "known");
    assert!(errors[0].1.contains("MalformedCallback"));
}

#[tokio::test]
async fn test_paging_without_a_cursor_fails_cleanly() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_callback(&callback(7, 55, "search next 10", "no markers in this text"))
        .await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "We are experiencing some technical problems, sorry!"
    );
    let errors = h.journal.errors();
    assert_eq!(errors[0].0, "known");
    assert!(errors[0].1.contains("MissingCursor"));
    assert!(h.feed.requests().is_empty());
}

#[tokio::test]
async fn test_set_category_records_then_updates() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot.handle_message(&text_message(7, "/set math.DS")).await;
    assert!(h.messenger.sent()[0]
        .text
        .starts_with("Your preferred category has been recorded!"));
    assert_eq!(h.preferences.get(7).await.unwrap(), Some("math.DS".to_string()));

    h.bot.handle_message(&text_message(7, "/set cs.AI")).await;
    assert!(h.messenger.sent()[1]
        .text
        .starts_with("Your preferred category has been updated!"));
    assert_eq!(h.preferences.get(7).await.unwrap(), Some("cs.AI".to_string()));
}

#[tokio::test]
async fn test_set_category_rejects_unknown_subjects() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_message(&text_message(7, "/set astro-zoology"))
        .await;

    assert!(h.messenger.sent()[0]
        .text
        .starts_with("Please use the arXiv subjects."));
    assert_eq!(h.preferences.get(7).await.unwrap(), None);
}

#[tokio::test]
async fn test_today_without_preference_prompts_for_set() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot.handle_message(&text_message(7, "/today")).await;

    let sent = h.messenger.sent();
    assert!(sent[0]
        .text
        .starts_with("You have not /set your favourite arXiv category."));
    assert!(sent[0].text.contains("<i>/set favourite_category</i>"));
    assert!(h.feed.requests().is_empty());
}

#[tokio::test]
async fn test_today_uses_the_stored_preference() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(rss_payload(&["Fresh paper"], &[])));
    h.preferences.set(7, "math.DS").await.unwrap();

    h.bot.handle_message(&text_message(7, "/today")).await;

    assert_eq!(h.feed.requests(), vec!["http://arxiv.org/rss/math.DS".to_string()]);
}

#[tokio::test]
async fn test_today_lists_only_fresh_submissions() {
    init_tracing();
    info!("Testing the daily listing flow");

    let h = harness(StubFeedClient::with_payload(rss_payload(
        &["First paper", "Second paper"],
        &["Stale paper"],
    )));
    h.bot.handle_message(&text_message(7, "/today cs.AI")).await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .text
        .starts_with("List of submissions to <b>cs.AI</b> for today Wed, 19 Jul 17.\n\n"));
    assert!(sent[0].text.contains("<b>1</b>. <em>First paper</em>"));
    assert!(sent[0].text.contains("<b>2</b>. <em>Second paper</em>"));
    assert!(!sent[0].text.contains("Stale paper"));
    assert!(!sent[0].text.contains("remaining submissions"));
}

#[tokio::test]
async fn test_today_with_only_updated_entries_apologizes() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(rss_payload(&[], &["Stale paper"])));

    h.bot.handle_message(&text_message(7, "/today cs.AI")).await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "There are no submissions to your favourite category today, try tomorrow!"
    );
}

#[tokio::test]
async fn test_today_counts_the_submissions_it_holds_back() {
    init_tracing();
    let mut config = test_config();
    config.search.max_rss_results = 2;
    let h = harness_with(
        StubFeedClient::with_payload(rss_payload(&["One", "Two", "Three"], &[])),
        MemoryJournal::default(),
        config,
    );

    h.bot.handle_message(&text_message(7, "/today cs.AI")).await;

    let sent = h.messenger.sent();
    let text = &sent[0].text;
    assert!(text.contains("<b>1</b>. <em>One</em>"));
    assert!(text.contains("<b>2</b>. <em>Two</em>"));
    assert!(!text.contains("<em>Three</em>"));
    assert!(text.contains(
        "There are 1 remaining submissions today.\nConsider visiting the arXiv web-page to see them."
    ));
}

#[tokio::test]
async fn test_long_daily_listings_split_into_several_messages() {
    init_tracing();
    let mut config = test_config();
    config.search.char_budget = 160;
    let h = harness_with(
        StubFeedClient::with_payload(rss_payload(&["Paper one", "Paper two", "Paper three"], &[])),
        MemoryJournal::default(),
        config,
    );

    h.bot.handle_message(&text_message(7, "/today cs.AI")).await;

    let sent = h.messenger.sent();
    assert!(sent.len() > 1);
    assert!(sent[0].text.starts_with("List of submissions"));
    assert!(sent.iter().all(|message| message.rich));
}

#[tokio::test]
async fn test_feedback_prompt_mentions_the_address() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot.handle_message(&text_message(7, "/feedback")).await;

    let sent = h.messenger.sent();
    assert!(sent[0].text.starts_with("We are always happy to hear your view!"));
    assert!(sent[0].text.ends_with("or email us at arxivbot@example.com"));
    assert!(h
        .journal
        .entries()
        .iter()
        .all(|entry| !matches!(entry, JournalRecord::Feedback { .. })));
}

#[tokio::test]
async fn test_feedback_is_recorded_and_thanked() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot
        .handle_message(&text_message(7, "/feedback I like this bot"))
        .await;

    assert!(h.journal.entries().contains(&JournalRecord::Feedback {
        comment: "I like this bot".to_string(),
    }));
    assert_eq!(
        h.messenger.sent()[0].text,
        "Thanks for your feedback! \u{1F604}"
    );
}

#[tokio::test]
async fn test_help_shows_the_commands_with_an_example_category() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    // Chat 7 against three configured categories lands on the second one.
    h.bot.handle_message(&text_message(7, "/help")).await;

    let text = &h.messenger.sent()[0].text;
    assert!(text.starts_with("Search for papers on the arXiv with this bot."));
    assert!(text.contains("<i>e.g. /search atom 2017</i>"));
    assert!(text.contains("<i>e.g. /today math.DS</i>"));
    assert!(text.contains("<i>e.g. /set math.DS</i>"));
    assert!(text.contains("<i>e.g. /feedback I like this bot!</i>"));
    assert!(text.ends_with("Enjoy your search! \u{1F609}"));
}

#[tokio::test]
async fn test_help_with_arguments_falls_back_to_the_hint() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(String::new()));

    h.bot.handle_message(&text_message(7, "/help me please")).await;

    assert_eq!(
        h.messenger.sent()[0].text,
        "See the /help for information on this Bot!"
    );
}

#[tokio::test]
async fn test_journal_failures_abort_with_a_database_apology() {
    init_tracing();
    let h = harness_with(
        StubFeedClient::with_payload(api_payload(2, &["Unreached"])),
        MemoryJournal::failing_messages(),
        test_config(),
    );

    h.bot.handle_message(&text_message(7, "/search atom")).await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        "We are experiencing some issues with our database. Sorry!"
    );
    assert!(h.feed.requests().is_empty());

    // The failure itself still lands in the error journal.
    let errors = h.journal.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "known");
}

#[tokio::test]
async fn test_rate_limited_sends_yield_the_rate_apology() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(api_payload(2, &["Paper"])));
    h.messenger.fail_next_send(MessengerError::TooManyRequests);

    h.bot.handle_message(&text_message(7, "/search atom")).await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        "You can only make 20 requests per minutes. Please try later!"
    );
}

#[tokio::test]
async fn test_platform_send_failures_are_journaled() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(api_payload(2, &["Paper"])));
    h.messenger
        .fail_next_send(MessengerError::Platform("flood control".to_string()));

    h.bot.handle_message(&text_message(7, "/search atom")).await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].text,
        "The messaging platform is messing around with the results, we'll have a look into this. Sorry!"
    );
    let errors = h.journal.errors();
    assert_eq!(errors[0].0, "known");
    assert!(errors[0].1.contains("flood control"));
}

#[tokio::test]
async fn test_edit_failures_answer_through_the_button_press() {
    init_tracing();
    let h = harness(StubFeedClient::with_payload(api_payload(25, &["Paper"])));
    h.messenger
        .fail_next_edit(MessengerError::Platform("message is not modified".to_string()));

    let message_text = Cursor::new(["atom"], 0).echo_block();
    h.bot
        .handle_callback(&callback(7, 55, "search next 10", &message_text))
        .await;

    let acks = h.messenger.acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].0, 55);
    assert_eq!(
        acks[0].1.as_deref(),
        Some("You are probably clicking the buttons too quickly. Slow down! \u{1F422}")
    );
    let errors = h.journal.errors();
    assert_eq!(errors[0].0, "known");
    assert!(errors[0].1.contains("message is not modified"));
}
