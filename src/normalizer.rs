use feed_rs::parser;

use crate::types::{BotError, CanonicalRecord, FeedMeta, FeedShape, ParsedFeed, RawEntry, Result};

/// Parses a raw feed payload into the dialect-neutral intermediate form.
///
/// Both arXiv dialects are handled by the same parser. The OpenSearch total
/// is not part of the parsed model, so it is recovered from the raw text.
pub fn parse_payload(payload: &str) -> Result<ParsedFeed> {
    let feed = parser::parse(payload.as_bytes())
        .map_err(|e| BotError::MalformedPayload(format!("Failed to parse feed: {}", e)))?;

    let meta = FeedMeta {
        title: feed.title.map(|t| t.content),
        updated: feed.updated,
        total_results: extract_total_results(payload),
    };

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| RawEntry {
            title: entry.title.map(|t| t.content),
            // RSS item <author> text lands in the email slot with a literal
            // "author" name; Atom and dc:creator names arrive in `name`.
            authors: entry
                .authors
                .into_iter()
                .map(|person| person.email.unwrap_or(person.name))
                .collect(),
            date: entry.published.or(entry.updated).map(|d| d.to_rfc3339()),
            link: entry.links.first().map(|l| l.href.clone()),
        })
        .collect();

    Ok(ParsedFeed { meta, entries })
}

/// Turns parsed entries into canonical records under the rules of the given
/// feed shape.
///
/// Entries with no usable field at all are dropped silently; a feed that
/// yields no record is reported as [`BotError::NoResults`].
pub fn normalize(
    feed: &ParsedFeed,
    shape: FeedShape,
    max_authors: usize,
) -> Result<Vec<CanonicalRecord>> {
    if max_authors < 1 {
        return Err(BotError::InvalidParameter(
            "the author cap must be at least one".to_string(),
        ));
    }

    let records: Vec<CanonicalRecord> = feed
        .entries
        .iter()
        .map(|entry| match shape {
            FeedShape::Api => api_record(entry, max_authors),
            FeedShape::Rss => rss_record(entry, max_authors),
        })
        .filter(|record| !record.is_blank())
        .collect();

    if records.is_empty() {
        return Err(BotError::NoResults);
    }

    Ok(records)
}

/// The server-reported result total of an API payload.
pub fn total_results(feed: &ParsedFeed) -> Result<i64> {
    let raw = feed.meta.total_results.as_deref().ok_or_else(|| {
        BotError::MissingMetadata("the feed reports no total result count".to_string())
    })?;

    raw.trim().parse::<i64>().map_err(|_| {
        BotError::InvalidArgument(format!("total result count '{}' is not an integer", raw))
    })
}

fn api_record(entry: &RawEntry, max_authors: usize) -> CanonicalRecord {
    let title = entry
        .title
        .as_deref()
        .map(|t| escape_markup(&collapse_whitespace(t)))
        .filter(|t| !t.is_empty());

    let names: Vec<&str> = entry
        .authors
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    let authors = if names.is_empty() {
        None
    } else if names.len() > max_authors {
        Some(format!("{}, et al.", names[..max_authors].join(", ")))
    } else {
        Some(names.join(", "))
    };

    CanonicalRecord {
        title,
        authors,
        year: entry.date.as_deref().and_then(find_year),
        link: entry.link.clone(),
        updated: false,
    }
}

fn rss_record(entry: &RawEntry, max_authors: usize) -> CanonicalRecord {
    let raw_title = entry.title.as_deref().map(collapse_whitespace);
    let updated = raw_title
        .as_deref()
        .map(|t| t.ends_with("UPDATED)"))
        .unwrap_or(false);

    let title = raw_title
        .map(|t| match t.rfind(". (arXiv:") {
            Some(idx) => escape_markup(&t[..idx]),
            None => escape_markup(&t),
        })
        .filter(|t| !t.is_empty());

    let joined = entry
        .authors
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let flat = strip_anchor_tags(&joined);
    let authors = Some(truncate_author_list(&flat, max_authors)).filter(|a| !a.is_empty());

    CanonicalRecord {
        title,
        authors,
        year: None,
        link: entry.link.clone(),
        updated,
    }
}

/// Cuts a comma-separated author list after `max_authors` names.
fn truncate_author_list(list: &str, max_authors: usize) -> String {
    match list.match_indices(',').nth(max_authors - 1) {
        Some((idx, _)) => format!("{}, et al.", &list[..idx]),
        None => list.to_string(),
    }
}

fn strip_anchor_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Escapes the markup-significant characters of the outbound rich-text
/// dialect. The ampersand goes first so entities are not double-escaped.
fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The leading four characters of a date string, read as the year. Dates
/// shorter than four characters yield nothing.
fn find_year(date: &str) -> Option<String> {
    if date.chars().count() > 3 {
        Some(date.chars().take(4).collect())
    } else {
        None
    }
}

fn extract_total_results(payload: &str) -> Option<String> {
    let open = payload.find("<opensearch:totalResults")?;
    let rest = &payload[open..];
    let start = rest.find('>')? + 1;
    let end = rest[start..].find('<')? + start;
    let value = rest[start..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
