use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::registry::{default_feeds, FeedSource};

pub const DEFAULT_RELAY_URL: &str = "https://api.allorigins.win/get";
pub const DEFAULT_IMAGE_URL: &str = "https://photo-ten-iota.vercel.app/NipponNewsImage.png";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the HTTP API listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// CORS relay endpoint; empty or absent disables the relay
    #[serde(default = "default_relay_url")]
    pub relay_url: Option<String>,
    /// Upper bound for a single feed fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Image used when an item carries no usable picture
    #[serde(default = "default_image_url")]
    pub default_image_url: String,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_relay_url() -> Option<String> {
    Some(DEFAULT_RELAY_URL.to_string())
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_image_url() -> String {
    DEFAULT_IMAGE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            relay_url: default_relay_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            default_image_url: default_image_url(),
            feeds: default_feeds(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        if config
            .relay_url
            .as_deref()
            .is_some_and(|relay| relay.trim().is_empty())
        {
            config.relay_url = None;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be greater than zero");
        }
        if self.default_image_url.trim().is_empty() {
            anyhow::bail!("default_image_url must not be empty");
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if feed.id.trim().is_empty() {
                anyhow::bail!("feed '{}' has an empty id", feed.name);
            }
            if feed.url.trim().is_empty() {
                anyhow::bail!("feed '{}' has an empty url", feed.id);
            }
            if !seen.insert(feed.id.as_str()) {
                anyhow::bail!("duplicate feed id '{}'", feed.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::from_str("").unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.relay_url.as_deref(), Some(DEFAULT_RELAY_URL));
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_image_url, DEFAULT_IMAGE_URL);
        assert_eq!(config.feeds.len(), 8);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            bind_addr = "127.0.0.1:8080"
            relay_url = "https://relay.example.com/get"
            fetch_timeout_secs = 3

            [[feeds]]
            id = "sports"
            name = "スポーツ"
            url = "https://example.com/sports.xml"
            source = "Example News"

            [[feeds]]
            id = "it"
            name = "IT"
            url = "https://example.org/it.xml"
            source = "Example Tech"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.relay_url.as_deref(), Some("https://relay.example.com/get"));
        assert_eq!(config.fetch_timeout_secs, 3);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].id, "sports");
        assert_eq!(config.feeds[0].source_label, "Example News");
        assert_eq!(config.feeds[1].url, "https://example.org/it.xml");
    }

    #[test]
    fn test_empty_relay_disables_relay() {
        let config = Config::from_str(r#"relay_url = """#).unwrap();
        assert!(config.relay_url.is_none());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/feeds.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_required_fields() {
        let content = r#"
            [[feeds]]
            id = "top"
            name = "トップ"
            # Missing url and source
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_duplicate_feed_ids_rejected() {
        let content = r#"
            [[feeds]]
            id = "top"
            name = "A"
            url = "https://a.example.com/rss"
            source = "A"

            [[feeds]]
            id = "top"
            name = "B"
            url = "https://b.example.com/rss"
            source = "B"
        "#;

        let err = Config::from_str(content).unwrap_err();
        assert!(err.to_string().contains("duplicate feed id"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(Config::from_str("fetch_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_empty_feeds_list() {
        let config = Config::from_str("feeds = []").unwrap();
        assert!(config.feeds.is_empty());
    }
}
