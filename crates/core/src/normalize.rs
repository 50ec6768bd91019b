//! Result normalization.
//!
//! Turns whatever a strategy extracted into the canonical record shape:
//! whitespace collapsed, strings truncated on character boundaries, `full_url`
//! strictly parsed and re-serialized, `display_url` derived from its host and
//! ids renumbered from 1. Running it twice is a no-op.

use url::Url;

use crate::Error;
use crate::model::{Category, ExtractedRecord, MAX_DESCRIPTION_CHARS, MAX_RESULTS, MAX_TITLE_CHARS};

/// Display URL used when a valid URL carries an empty host.
pub const FALLBACK_DISPLAY_URL: &str = "website.com";

/// Upper bound for the short optional fields (duration, source, date).
const MAX_META_CHARS: usize = 100;

/// Collapse runs of whitespace and truncate to `max_chars` characters.
pub fn clean_text(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

/// Parse an absolute `http`/`https` URL.
pub fn parse_full_url(raw: &str) -> Result<Url, Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("empty url".into()));
    }

    let parsed = Url::parse(trimmed).map_err(|e| Error::Validation(format!("invalid url {trimmed:?}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(Error::Validation(format!("unsupported scheme: {scheme}"))),
    }
}

/// Host of a parsed URL, or the literal fallback when the host is empty.
pub fn display_url_for(url: &Url) -> String {
    match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => FALLBACK_DISPLAY_URL.to_string(),
    }
}

fn optional_url(value: Option<&str>) -> Option<String> {
    value.and_then(|v| parse_full_url(v).ok()).map(|u| u.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(|v| clean_text(v, MAX_META_CHARS))
        .filter(|v| !v.is_empty())
}

/// Validate and reshape a single record. The id is left untouched.
pub fn validate(record: &ExtractedRecord) -> Result<ExtractedRecord, Error> {
    let title = clean_text(&record.title, MAX_TITLE_CHARS);
    if title.is_empty() {
        return Err(Error::Validation("empty title".into()));
    }

    let full_url = parse_full_url(&record.full_url)?;

    Ok(ExtractedRecord {
        id: record.id,
        title,
        display_url: display_url_for(&full_url),
        full_url: full_url.to_string(),
        description: clean_text(&record.description, MAX_DESCRIPTION_CHARS),
        image_url: optional_url(record.image_url.as_deref()),
        thumbnail: optional_url(record.thumbnail.as_deref()),
        duration: optional_text(record.duration.as_deref()),
        source: optional_text(record.source.as_deref()),
        date: optional_text(record.date.as_deref()),
    })
}

/// Whether a record would survive normalization for `category`.
pub fn is_usable(record: &ExtractedRecord, category: Category) -> bool {
    validate(record).is_ok_and(|r| fits_category(&r, category))
}

fn fits_category(record: &ExtractedRecord, category: Category) -> bool {
    match category {
        Category::Images => record.image_url.is_some(),
        _ => true,
    }
}

/// Normalize a batch of extracted records for `category`.
///
/// Invalid records are dropped individually; the rest keep their order, are
/// capped at [`MAX_RESULTS`] and renumbered from 1.
pub fn normalize(records: &[ExtractedRecord], category: Category) -> Vec<ExtractedRecord> {
    let mut normalized = Vec::with_capacity(records.len().min(MAX_RESULTS));

    for record in records {
        if normalized.len() >= MAX_RESULTS {
            break;
        }

        match validate(record) {
            Ok(valid) if fits_category(&valid, category) => normalized.push(valid),
            Ok(_) => tracing::debug!(title = %record.title, %category, "dropping record unfit for category"),
            Err(e) => tracing::debug!(title = %record.title, error = %e, "dropping invalid record"),
        }
    }

    for (idx, record) in normalized.iter_mut().enumerate() {
        record.id = idx as u32 + 1;
    }

    normalized
}
