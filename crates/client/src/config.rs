use std::time::Duration;

/// Languages the catalog serves metadata in (ISO 639-1).
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "cs", "da", "de", "el", "en", "es", "fi", "fr", "he", "hr", "hu", "it", "ja", "ko", "nl",
    "no", "pl", "pt", "ru", "sl", "sv", "tr", "zh",
];

pub const DEFAULT_LANGUAGE: &str = "en";

/// Client configuration, injected by the caller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    /// Preferred metadata language; unsupported values fall back to English.
    pub language: String,
    /// Treat season 0 as a regular season when ordering episodes.
    pub include_specials: bool,
    pub force_english_metadata: bool,
    pub base_url: String,
    pub artwork_base_url: String,
    /// `None` issues one request per id at once.
    pub max_concurrent_requests: Option<usize>,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            include_specials: false,
            force_english_metadata: false,
            base_url: "https://thetvdb.com/api".to_string(),
            artwork_base_url: "https://thetvdb.com/banners/".to_string(),
            max_concurrent_requests: None,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Build from `SHOWSYNC_*` environment variables, defaulting anything unset
    /// or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let flag = |name: &str| {
            std::env::var(name)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };

        Self {
            api_key: std::env::var("SHOWSYNC_API_KEY").unwrap_or_default(),
            language: std::env::var("SHOWSYNC_LANGUAGE").unwrap_or(defaults.language),
            include_specials: flag("SHOWSYNC_INCLUDE_SPECIALS"),
            force_english_metadata: flag("SHOWSYNC_FORCE_ENGLISH"),
            base_url: std::env::var("SHOWSYNC_BASE_URL").unwrap_or(defaults.base_url),
            artwork_base_url: std::env::var("SHOWSYNC_ARTWORK_BASE_URL")
                .unwrap_or(defaults.artwork_base_url),
            max_concurrent_requests: std::env::var("SHOWSYNC_MAX_CONCURRENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0),
            request_timeout_secs: std::env::var("SHOWSYNC_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
        }
    }

    /// Language used for metadata requests.
    pub fn effective_language(&self) -> &str {
        if self.force_english_metadata {
            return DEFAULT_LANGUAGE;
        }
        let wanted = self.language.trim();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|l| l.eq_ignore_ascii_case(wanted))
            .copied()
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_falls_back_to_english() {
        let mut config = ClientConfig::new("key");
        config.language = "xx".into();
        assert_eq!(config.effective_language(), "en");

        config.language = "ES".into();
        assert_eq!(config.effective_language(), "es");
    }

    #[test]
    fn force_english_wins() {
        let mut config = ClientConfig::new("key");
        config.language = "de".into();
        config.force_english_metadata = true;
        assert_eq!(config.effective_language(), "en");
    }
}
