use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::categories::CategorySet;
use crate::types::{BotError, Result, SearchConfig};

/// Builds arXiv request URLs for both the search API and the category
/// RSS feeds.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    api_base: String,
    rss_base: String,
    categories: CategorySet,
}

/// Optional per-field terms of an advanced API search. Absent fields are
/// left out of the query.
#[derive(Debug, Clone, Default)]
pub struct SearchFields {
    pub author: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub comment: Option<String>,
    pub journal_ref: Option<String>,
    pub category: Option<String>,
    pub report_number: Option<String>,
    pub id: Option<String>,
}

impl QueryBuilder {
    pub fn new(config: &SearchConfig, categories: CategorySet) -> Self {
        Self {
            api_base: config.api_base.clone(),
            rss_base: config.rss_base.clone(),
            categories,
        }
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Builds an all-fields keyword search over the API.
    ///
    /// Keywords that are blank after trimming are skipped. An input with no
    /// usable keyword is rejected rather than turned into a match-all query.
    pub fn keyword_query<S: AsRef<str>>(
        &self,
        keywords: &[S],
        start: i64,
        max_results: i64,
    ) -> Result<String> {
        let terms: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(|k| format!("all:{}", k))
            .collect();

        if terms.is_empty() {
            return Err(BotError::EmptyQuery);
        }

        Ok(format!(
            "{}{}&start={}&max_results={}",
            self.api_base,
            terms.join("+AND+"),
            start,
            max_results
        ))
    }

    /// Builds a field-targeted API search from whichever fields are present,
    /// in a fixed field order.
    pub fn advanced_query(&self, fields: &SearchFields) -> Result<String> {
        let pairs = [
            ("au:", &fields.author),
            ("ti:", &fields.title),
            ("abs:", &fields.abstract_text),
            ("co:", &fields.comment),
            ("jr:", &fields.journal_ref),
            ("cat:", &fields.category),
            ("rn:", &fields.report_number),
            ("id:", &fields.id),
        ];

        let terms: Vec<String> = pairs
            .iter()
            .filter_map(|(prefix, value)| {
                value.as_ref().map(|v| format!("{}{}", prefix, v))
            })
            .collect();

        if terms.is_empty() {
            return Err(BotError::EmptyQuery);
        }

        Ok(format!("{}{}", self.api_base, terms.join("+AND+")))
    }

    /// The RSS feed link of one category.
    pub fn category_feed_url(&self, category: &str) -> Result<String> {
        if !self.categories.contains(category) {
            return Err(BotError::InvalidCategory {
                category: category.to_string(),
            });
        }
        Ok(format!("{}{}", self.rss_base, category))
    }

    /// Builds an API search for one category restricted to the submission
    /// window behind the arXiv publication closest to `reference`.
    ///
    /// Windows close at 18:00 and skip the weekend, so the distance of both
    /// bounds from `reference` depends on its weekday. A Tuesday for
    /// instance reaches back across the weekend to the previous Friday.
    pub fn category_day_query(&self, category: &str, reference: DateTime<Utc>) -> Result<String> {
        if !self.categories.contains(category) {
            return Err(BotError::InvalidCategory {
                category: category.to_string(),
            });
        }

        let (from_back, to_back) = match reference.weekday() {
            Weekday::Mon => (4, 3),
            Weekday::Tue => (4, 1),
            Weekday::Wed | Weekday::Thu | Weekday::Fri => (2, 1),
            Weekday::Sat => (3, 2),
            Weekday::Sun => (4, 3),
        };

        let date = reference.date_naive();
        let from = format!("{}1800", (date - Duration::days(from_back)).format("%Y%m%d"));
        let to = format!("{}1800", (date - Duration::days(to_back)).format("%Y%m%d"));

        Ok(format!(
            "{}cat:{}+AND+submittedDate:[{}+TO+{}]",
            self.api_base, category, from, to
        ))
    }
}

/// Appends a result cap to an already built query.
pub fn append_result_window(query: &str, max_results: i64) -> Result<String> {
    if max_results < 0 {
        return Err(BotError::NegativeCount);
    }
    Ok(format!("{}&max_results={}", query, max_results))
}
