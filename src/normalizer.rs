use chrono::{DateTime, Duration, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::image::ImageExtractor;
use crate::parser::RawFeedEntry;
use crate::registry::FeedSource;

pub const SNIPPET_MAX_CHARS: usize = 200;
pub const PLACEHOLDER_LINK: &str = "#";
const ID_LEN: usize = 12;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>?").expect("valid tag pattern"));

/// Canonical news item handed to every consumer of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Random per fetch; the same article gets a new id on every refetch
    pub id: String,
    pub title: String,
    pub link: String,
    /// Raw feed timestamp, or RFC 3339 when the feed had none
    pub pub_date: String,
    pub content: String,
    /// Tag-free excerpt of `content`, at most 200 characters
    pub content_snippet: String,
    /// Never empty
    pub image_url: String,
    pub source: String,
}

impl NewsItem {
    /// Locally generated informational items carry `#` as their link.
    pub fn is_placeholder(&self) -> bool {
        self.link == PLACEHOLDER_LINK
    }
}

/// Base-36 token of 12 characters (about 62 bits of randomness).
pub fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

pub fn strip_html_tags(html: &str) -> String {
    HTML_TAG.replace_all(html, "").into_owned()
}

/// Plain-text excerpt capped at [`SNIPPET_MAX_CHARS`] characters.
pub fn make_snippet(content: &str) -> String {
    strip_html_tags(content)
        .trim()
        .chars()
        .take(SNIPPET_MAX_CHARS)
        .collect()
}

/// Builds a [`NewsItem`] from one parsed entry of `source`.
///
/// `now` stands in for a missing publish date so every item stays sortable.
pub fn normalize(
    entry: RawFeedEntry,
    source: &FeedSource,
    extractor: &dyn ImageExtractor,
    now: DateTime<Utc>,
) -> NewsItem {
    let image_url = extractor.extract(&entry);
    let pub_date = if entry.pub_date.trim().is_empty() {
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    } else {
        entry.pub_date
    };
    let content_snippet = make_snippet(&entry.description);

    NewsItem {
        id: generate_id(),
        title: entry.title,
        link: entry.link,
        pub_date,
        content: entry.description,
        content_snippet,
        image_url,
        source: source.source_label.clone(),
    }
}

/// Informational items shown in place of a feed that could not be loaded.
pub fn placeholder_items(source_label: &str, image_url: &str, now: DateTime<Utc>) -> Vec<NewsItem> {
    let notices = [
        (
            "最新ニュースを準備中です",
            "ニュースフィードの準備中です。しばらくお待ちください。",
            0,
        ),
        (
            "システムメンテナンス情報",
            "より良いサービス提供のため、システムの改善を行っています。",
            1,
        ),
        (
            "ニュース配信について",
            "複数のニュースソースから最新情報をお届けしています。",
            2,
        ),
    ];

    notices
        .into_iter()
        .map(|(title, body, hours_ago)| NewsItem {
            id: generate_id(),
            title: title.to_string(),
            link: PLACEHOLDER_LINK.to_string(),
            pub_date: (now - Duration::hours(hours_ago))
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            content: body.to_string(),
            content_snippet: body.to_string(),
            image_url: image_url.to_string(),
            source: source_label.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_IMAGE_URL;
    use crate::dates::effective_timestamp;
    use crate::image::HtmlImageExtractor;
    use crate::parser::parse_feed;
    use std::collections::HashSet;

    fn sports() -> FeedSource {
        FeedSource::new("sports", "スポーツ", "https://example/sports.xml", "Example Sports")
    }

    mod id_tests {
        use super::*;

        #[test]
        fn test_id_shape() {
            let id = generate_id();
            assert_eq!(id.len(), 12);
            assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }

        #[test]
        fn test_thousand_ids_are_unique() {
            let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
            assert_eq!(ids.len(), 1000);
        }
    }

    mod snippet_tests {
        use super::*;

        #[test]
        fn test_strip_tags() {
            assert_eq!(
                strip_html_tags(r#"<p>Hello <b>world</b><img src="x.jpg"></p>"#),
                "Hello world"
            );
        }

        #[test]
        fn test_strip_unterminated_tag() {
            assert_eq!(strip_html_tags("text <br"), "text ");
        }

        #[test]
        fn test_snippet_is_capped_by_characters() {
            let long = "あ".repeat(300);
            let snippet = make_snippet(&long);
            assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS);
        }

        #[test]
        fn test_short_snippet_unchanged() {
            assert_eq!(make_snippet("  <p>短い本文</p>  "), "短い本文");
        }
    }

    mod normalize_tests {
        use super::*;

        #[test]
        fn test_two_items_one_with_image() {
            let xml = r#"<rss><channel>
                <item>
                    <title>First</title>
                    <link>https://example/sports/1</link>
                    <pubDate>Mon, 09 Dec 2024 12:00:00 +0900</pubDate>
                    <description><![CDATA[<img src="https://img.example/first.jpg">本文]]></description>
                </item>
                <item>
                    <title>Second</title>
                    <link>https://example/sports/2</link>
                    <pubDate>Mon, 09 Dec 2024 10:00:00 +0900</pubDate>
                    <description>画像なし</description>
                </item>
            </channel></rss>"#;

            let extractor = HtmlImageExtractor::default();
            let now = Utc::now();
            let items: Vec<NewsItem> = parse_feed(xml)
                .into_iter()
                .map(|entry| normalize(entry, &sports(), &extractor, now))
                .collect();

            assert_eq!(items.len(), 2);
            assert_eq!(items[0].image_url, "https://img.example/first.jpg");
            assert_eq!(items[1].image_url, DEFAULT_IMAGE_URL);
            assert_eq!(items[0].source, "Example Sports");
            assert_eq!(items[0].content_snippet, "本文");
            assert_eq!(items[0].pub_date, "Mon, 09 Dec 2024 12:00:00 +0900");
            assert_ne!(items[0].id, items[1].id);
        }

        #[test]
        fn test_missing_pub_date_becomes_now() {
            let extractor = HtmlImageExtractor::default();
            let now = Utc::now();
            let entry = RawFeedEntry {
                title: "No date".to_string(),
                pub_date: String::new(),
                ..Default::default()
            };

            let item = normalize(entry, &sports(), &extractor, now);

            assert!(!item.pub_date.is_empty());
            let effective = effective_timestamp(&item.pub_date, Utc::now());
            assert!((effective - now).num_milliseconds().abs() <= 1);
        }

        #[test]
        fn test_every_item_has_id_and_image() {
            let extractor = HtmlImageExtractor::default();
            let item = normalize(RawFeedEntry::default(), &sports(), &extractor, Utc::now());
            assert!(!item.id.is_empty());
            assert!(!item.image_url.is_empty());
            assert!(!item.is_placeholder());
        }

        #[test]
        fn test_serializes_camel_case() {
            let extractor = HtmlImageExtractor::default();
            let item = normalize(RawFeedEntry::default(), &sports(), &extractor, Utc::now());
            let json = serde_json::to_value(&item).unwrap();
            assert!(json.get("pubDate").is_some());
            assert!(json.get("contentSnippet").is_some());
            assert!(json.get("imageUrl").is_some());
        }
    }

    mod placeholder_tests {
        use super::*;

        #[test]
        fn test_placeholder_set() {
            let now = Utc::now();
            let items = placeholder_items("NHK News", DEFAULT_IMAGE_URL, now);

            assert_eq!(items.len(), 3);
            assert!(items.iter().all(NewsItem::is_placeholder));
            assert!(items.iter().all(|i| i.source == "NHK News"));
            assert!(items.iter().all(|i| i.image_url == DEFAULT_IMAGE_URL));

            let times: Vec<_> = items
                .iter()
                .map(|i| effective_timestamp(&i.pub_date, Utc::now()))
                .collect();
            assert!(times.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
