//! Minimal RSS 2.0 reader.
//!
//! Only direct children of `<item>` are read (`title`, `link`, `pubDate`,
//! `description` and an image `enclosure`). Anything the reader cannot make
//! sense of degrades to fewer entries rather than an error.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// One `<item>` as it appeared in the feed, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedEntry {
    pub title: String,
    pub link: String,
    /// Timestamp exactly as the feed wrote it
    pub pub_date: String,
    /// Raw HTML or text body
    pub description: String,
    /// `url` of an `<enclosure>` whose `type` starts with `image`
    pub image_enclosure: Option<String>,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("relay envelope has no contents")]
    MissingContents,
}

#[derive(Debug, Deserialize)]
struct RelayEnvelope {
    contents: Option<String>,
}

/// Returns the feed document carried by a relay response.
///
/// Relays either pass the XML through untouched or wrap it as
/// `{"contents": "<xml>"}`. A JSON body without usable `contents` is an error.
pub fn unwrap_relay_envelope(body: &str) -> Result<Cow<'_, str>, RelayError> {
    if !body.trim_start().starts_with('{') {
        return Ok(Cow::Borrowed(body));
    }

    let envelope: RelayEnvelope = serde_json::from_str(body)?;
    match envelope.contents {
        Some(contents) if !contents.trim().is_empty() => Ok(Cow::Owned(contents)),
        _ => Err(RelayError::MissingContents),
    }
}

/// Parses either raw XML or a relay envelope around it.
pub fn parse_document(body: &str) -> Vec<RawFeedEntry> {
    match unwrap_relay_envelope(body) {
        Ok(xml) => parse_feed(&xml),
        Err(e) => {
            warn!(error = %e, "Relay envelope unusable, treating feed as empty");
            Vec::new()
        }
    }
}

/// Parses an RSS document into its items. Malformed XML yields no items.
pub fn parse_feed(xml: &str) -> Vec<RawFeedEntry> {
    match read_items(xml) {
        Ok(entries) => {
            debug!(count = entries.len(), "Parsed feed document");
            entries
        }
        Err(e) => {
            warn!(error = %e, "Malformed feed document, returning no items");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    PubDate,
    Description,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }

    fn slot(self, entry: &mut RawFeedEntry) -> &mut String {
        match self {
            Field::Title => &mut entry.title,
            Field::Link => &mut entry.link,
            Field::PubDate => &mut entry.pub_date,
            Field::Description => &mut entry.description,
        }
    }
}

fn read_items(xml: &str) -> Result<Vec<RawFeedEntry>, quick_xml::Error> {
    // Whitespace is kept so nested markup joins like DOM textContent;
    // fields are trimmed once the item closes.
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut current: Option<RawFeedEntry> = None;
    // Nesting below the open <item>; 1 is a direct child.
    let mut depth = 0usize;
    // Chosen at depth 1 and kept for any markup nested inside it.
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match current.as_mut() {
                Some(entry) => {
                    depth += 1;
                    if depth == 1 {
                        field = Field::from_name(e.name().as_ref());
                        if e.name().as_ref() == b"enclosure" {
                            read_enclosure(&e, entry);
                        }
                    }
                }
                None => {
                    if e.name().as_ref() == b"item" {
                        current = Some(RawFeedEntry::default());
                        depth = 0;
                        field = None;
                    }
                }
            },
            Event::Empty(e) => match current.as_mut() {
                Some(entry) => {
                    if depth == 0 && e.name().as_ref() == b"enclosure" {
                        read_enclosure(&e, entry);
                    }
                }
                None => {
                    if e.name().as_ref() == b"item" {
                        entries.push(RawFeedEntry::default());
                    }
                }
            },
            Event::End(_) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(entry) = current.take() {
                            entries.push(finish(entry));
                        }
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            field = None;
                        }
                    }
                }
            }
            Event::Text(e) => {
                if depth >= 1 {
                    if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                        let text = match e.unescape() {
                            Ok(text) => text.into_owned(),
                            // Unknown entities such as &nbsp; are kept verbatim
                            Err(_) => String::from_utf8_lossy(&e).into_owned(),
                        };
                        field.slot(entry).push_str(&text);
                    }
                }
            }
            Event::CData(e) => {
                if depth >= 1 {
                    if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                        field
                            .slot(entry)
                            .push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn read_enclosure(e: &BytesStart<'_>, entry: &mut RawFeedEntry) {
    let mut url = None;
    let mut is_image = false;

    for attr in e.attributes().flatten() {
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        match attr.key.as_ref() {
            b"url" => url = Some(value.trim().to_string()),
            b"type" => is_image = value.trim().to_ascii_lowercase().starts_with("image"),
            _ => {}
        }
    }

    if is_image && entry.image_enclosure.is_none() {
        entry.image_enclosure = url.filter(|u| !u.is_empty());
    }
}

fn finish(mut entry: RawFeedEntry) -> RawFeedEntry {
    entry.title = entry.title.trim().to_string();
    entry.link = entry.link.trim().to_string();
    entry.pub_date = entry.pub_date.trim().to_string();
    entry.description = entry.description.trim().to_string();
    entry
}
