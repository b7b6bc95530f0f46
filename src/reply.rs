use chrono::{DateTime, Duration, Utc};

use crate::cursor::{next_callback, previous_callback, Cursor, CALLBACK_CLOSE};
use crate::messenger::{NavButton, NavControls};
use crate::types::{CanonicalRecord, ResultPage, SearchConfig};

/// Which navigation directions are open from a given result window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavState {
    pub has_prev: bool,
    pub has_next: bool,
}

pub fn nav_state(start: i64, total: i64, page_size: i64) -> NavState {
    NavState {
        has_prev: start > 0,
        has_next: total - (start + page_size) > 0,
    }
}

/// Packs entry chunks into messages that stay under the platform character
/// cap.
///
/// The first message opens with `initial`. A chunk that would push the
/// current message to the cap starts the next one; chunks are never split
/// internally, so every entry stays whole within one message.
pub fn split_by_budget(initial: String, chunks: &[String], char_budget: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = initial;

    for chunk in chunks {
        if !current.is_empty() && current.chars().count() + chunk.chars().count() >= char_budget {
            messages.push(current);
            current = String::new();
        }
        current.push_str(chunk);
    }
    if !current.is_empty() {
        messages.push(current);
    }

    messages
}

/// Renders result pages and daily listings into outbound message text.
#[derive(Debug, Clone)]
pub struct ReplyFormatter {
    page_size: i64,
    char_budget: usize,
}

impl ReplyFormatter {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            page_size: config.page_size,
            char_budget: config.char_budget,
        }
    }

    /// One page of search results, opened by the keyword echo block and
    /// closed by a total trailer when more pages exist.
    ///
    /// Result numbering continues across pages, so the third result of the
    /// second ten-result page is number 13.
    pub fn format_search_page(&self, cursor: &Cursor, page: &ResultPage) -> String {
        let mut message = cursor.echo_block();

        let mut counter = page.start_offset;
        for record in &page.records {
            counter += 1;
            message.push_str(&format_record(counter, record));
        }

        let total = page.known_total();
        if total > self.page_size {
            message.push_str(&format!(
                "There are {} results associated with this search.",
                total
            ));
        }

        message
    }

    /// The daily listing of one category, split across as many messages as
    /// the character cap requires.
    ///
    /// Feeds are published the evening before the day they cover, so the
    /// displayed date is the feed date moved forward by one day.
    pub fn format_today_pages(
        &self,
        category: &str,
        feed_date: DateTime<Utc>,
        records: &[CanonicalRecord],
        remaining: i64,
    ) -> Vec<String> {
        let display_date = (feed_date + Duration::days(1)).format("%a, %d %b %y");
        let header = format!(
            "List of submissions to <b>{}</b> for today {}.\n\n",
            category, display_date
        );

        let mut chunks: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| format_record(idx as i64 + 1, record))
            .collect();
        if remaining > 0 {
            chunks.push(format!(
                "There are {} remaining submissions today.\nConsider visiting the arXiv web-page to see them.",
                remaining
            ));
        }

        split_by_budget(header, &chunks, self.char_budget)
    }

    /// The button row attached to a search page.
    pub fn search_controls(&self, start: i64, total: i64) -> NavControls {
        let state = nav_state(start, total, self.page_size);

        let mut buttons = vec![NavButton::new("Close", CALLBACK_CLOSE)];
        if state.has_prev {
            buttons.push(NavButton::new(
                "Prev",
                previous_callback(start - self.page_size),
            ));
        }
        if state.has_next {
            buttons.push(NavButton::new("Next", next_callback(start + self.page_size)));
        }

        NavControls { buttons }
    }
}

/// One numbered entry. Absent fields drop their line rather than rendering
/// a placeholder.
fn format_record(counter: i64, record: &CanonicalRecord) -> String {
    let mut chunk = format!("<b>{}</b>. ", counter);
    if let Some(title) = &record.title {
        chunk.push_str(&format!("<em>{}</em>\n", title));
    }
    if let Some(authors) = &record.authors {
        chunk.push_str(authors);
        chunk.push('\n');
    }
    if let Some(year) = &record.year {
        chunk.push_str(&format!("<em>Submitted in {}</em>\n", year));
    }
    if let Some(link) = &record.link {
        chunk.push_str(link);
        chunk.push('\n');
    }
    chunk.push('\n');
    chunk
}
