//! Listing-document parsing
//!
//! Strict structured parsing first: a document either deserializes as a
//! sitemap index (references to further listing documents) or as a urlset
//! (content-bearing leaf listing). When the structured pass fails or yields
//! nothing, callers run the permissive extractor, which scans the raw text
//! for location-like substrings so that malformed-but-recoverable documents
//! still produce entries. The degraded path is a first-class branch, not an
//! exception handler.

use crate::url::is_listing_ref;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// One entry of a listing document
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub location: Url,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A parsed listing, tagged by its container element
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedListing {
    /// References to further listing documents
    Index(Vec<ListingEntry>),
    /// Content-bearing leaf entries
    Leaf(Vec<ListingEntry>),
}

impl ParsedListing {
    pub fn entries(&self) -> &[ListingEntry] {
        match self {
            ParsedListing::Index(entries) | ParsedListing::Leaf(entries) => entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Structured parsing could not produce entries; run the fallback extractor
#[derive(Debug, Error)]
pub enum ListingParseError {
    #[error("structured parse yielded no entries: {0}")]
    NeedsFallback(String),
}

#[derive(Debug, Deserialize)]
struct SitemapIndexDoc {
    #[serde(rename = "sitemap")]
    sitemaps: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct UrlsetDoc {
    #[serde(rename = "url")]
    urls: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    loc: String,
    lastmod: Option<String>,
}

/// Parses a validated listing document.
///
/// Probes for the index container first (the two document shapes share entry
/// structure, and an index mistaken for a urlset would flatten the hierarchy).
/// Entries with locations that fail URL revalidation are dropped silently;
/// partial extraction is the expected degraded mode.
pub fn parse_listing(body: &str) -> Result<ParsedListing, ListingParseError> {
    if let Ok(doc) = from_str::<SitemapIndexDoc>(body) {
        let entries = convert_entries(doc.sitemaps);
        if !entries.is_empty() {
            return Ok(ParsedListing::Index(entries));
        }
    }

    if let Ok(doc) = from_str::<UrlsetDoc>(body) {
        let entries = convert_entries(doc.urls);
        if !entries.is_empty() {
            return Ok(ParsedListing::Leaf(entries));
        }
    }

    Err(ListingParseError::NeedsFallback(
        "document is neither a usable sitemap index nor a urlset".to_string(),
    ))
}

/// Permissive extraction pass for documents the structured parser rejected.
///
/// Scans for `<loc>` elements, then for bare absolute URLs when no location
/// tags survive. The result is tagged Index only when every extracted entry
/// references another listing document; mixed results land in a Leaf, and the
/// engine re-checks individual entries for nested-listing shapes.
pub fn extract_entries_fallback(body: &str) -> ParsedListing {
    let loc_pattern =
        Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("built-in location pattern compiles");

    let mut entries: Vec<ListingEntry> = loc_pattern
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| validate_location(m.as_str()))
        .map(|location| ListingEntry {
            location,
            last_modified: None,
        })
        .collect();

    if entries.is_empty() {
        let bare_pattern =
            Regex::new(r#"https?://[^\s"'<>]+"#).expect("built-in URL pattern compiles");
        entries = bare_pattern
            .find_iter(body)
            .filter_map(|m| validate_location(m.as_str()))
            .map(|location| ListingEntry {
                location,
                last_modified: None,
            })
            .collect();
    }

    if !entries.is_empty() && entries.iter().all(|e| is_listing_ref(&e.location)) {
        ParsedListing::Index(entries)
    } else {
        ParsedListing::Leaf(entries)
    }
}

fn convert_entries(raw: Vec<RawEntry>) -> Vec<ListingEntry> {
    raw.into_iter()
        .filter_map(|entry| {
            let location = validate_location(&entry.loc)?;
            let last_modified = entry.lastmod.as_deref().and_then(parse_lastmod);
            Some(ListingEntry {
                location,
                last_modified,
            })
        })
        .collect()
}

/// Re-validates an extracted location string as an absolute HTTP(S) URL
fn validate_location(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;
    Some(url)
}

/// Parses a lastmod value; sitemaps carry either full timestamps or bare dates
fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc))
}
