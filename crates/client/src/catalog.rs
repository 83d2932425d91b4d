//! Catalog endpoints and URL construction.

use reqwest::Url;
use showsync_core::{CatalogError, Show};

use crate::config::ClientConfig;

const WEB_BASE: &str = "https://thetvdb.com/";

/// Every request the client knows how to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    SearchByName { name: &'a str },
    /// Show record without episodes.
    Show { id: &'a str },
    /// Show record with every episode.
    ShowAll { id: &'a str },
    Episode { id: &'a str },
    EpisodeByNumber {
        show_id: &'a str,
        season: u32,
        number: u32,
    },
    ImagesForShow { id: &'a str },
    ActorsForShow { id: &'a str },
    /// Shows and episodes changed since a unix timestamp.
    UpdatedSince { since: i64 },
    ServerTime,
}

impl Endpoint<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchByName { .. } => "search_by_name",
            Self::Show { .. } => "show",
            Self::ShowAll { .. } => "show_all",
            Self::Episode { .. } => "episode",
            Self::EpisodeByNumber { .. } => "episode_by_number",
            Self::ImagesForShow { .. } => "images_for_show",
            Self::ActorsForShow { .. } => "actors_for_show",
            Self::UpdatedSince { .. } => "updated_since",
            Self::ServerTime => "server_time",
        }
    }
}

/// Pure URL builder bound to one configuration.
#[derive(Debug, Clone)]
pub struct Catalog {
    base_url: String,
    api_key: String,
    language: String,
    artwork_base_url: String,
}

impl Catalog {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            language: config.effective_language().to_string(),
            artwork_base_url: config.artwork_base_url.clone(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn artwork_base_url(&self) -> &str {
        &self.artwork_base_url
    }

    pub fn url(&self, endpoint: Endpoint<'_>) -> Result<String, CatalogError> {
        let key = self.api_key.as_str();
        let lang = self.language.as_str();
        match endpoint {
            Endpoint::SearchByName { name } => self.build(
                &["GetSeries.php"],
                &[("seriesname", name), ("language", "all")],
            ),
            Endpoint::Show { id } => self.build(&[key, "series", id, lang], &[]),
            Endpoint::ShowAll { id } => self.build(&[key, "series", id, "all", lang], &[]),
            Endpoint::Episode { id } => self.build(&[key, "episodes", id, lang], &[]),
            Endpoint::EpisodeByNumber {
                show_id,
                season,
                number,
            } => {
                let season = season.to_string();
                let number = number.to_string();
                self.build(
                    &[key, "series", show_id, "default", season.as_str(), number.as_str(), lang],
                    &[],
                )
            }
            Endpoint::ImagesForShow { id } => self.build(&[key, "series", id, "banners"], &[]),
            Endpoint::ActorsForShow { id } => self.build(&[key, "series", id, "actors"], &[]),
            Endpoint::UpdatedSince { since } => {
                let since = since.to_string();
                self.build(&["Updates.php"], &[("type", "all"), ("time", since.as_str())])
            }
            Endpoint::ServerTime => self.build(&["Updates.php"], &[("type", "none")]),
        }
    }

    fn build(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, CatalogError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            CatalogError::InvalidArgument(format!("base url {}: {e}", self.base_url))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                CatalogError::InvalidArgument(format!("base url {} cannot take a path", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }
}

/// Public web page of a show.
pub fn catalog_url_for_show(show: &Show) -> String {
    let mut url = format!("{WEB_BASE}?tab=series&id={}", show.id());
    if let Some(lang) = show.language() {
        url.push_str("&lid=");
        url.push_str(lang);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut config = ClientConfig::new("KEY");
        config.base_url = "https://example.test/api/".into();
        config.language = "es".into();
        Catalog::new(&config)
    }

    #[test]
    fn builds_show_urls() {
        let c = catalog();
        assert_eq!(
            c.url(Endpoint::ShowAll { id: "80379" }).unwrap(),
            "https://example.test/api/KEY/series/80379/all/es"
        );
        assert_eq!(
            c.url(Endpoint::Show { id: "80379" }).unwrap(),
            "https://example.test/api/KEY/series/80379/es"
        );
        assert_eq!(
            c.url(Endpoint::ImagesForShow { id: "80379" }).unwrap(),
            "https://example.test/api/KEY/series/80379/banners"
        );
        assert_eq!(
            c.url(Endpoint::EpisodeByNumber {
                show_id: "80379",
                season: 2,
                number: 5
            })
            .unwrap(),
            "https://example.test/api/KEY/series/80379/default/2/5/es"
        );
    }

    #[test]
    fn search_query_is_encoded() {
        let url = catalog()
            .url(Endpoint::SearchByName {
                name: "Law & Order",
            })
            .unwrap();
        assert_eq!(
            url,
            "https://example.test/api/GetSeries.php?seriesname=Law+%26+Order&language=all"
        );
    }

    #[test]
    fn ids_cannot_escape_their_segment() {
        let url = catalog().url(Endpoint::Episode { id: "../x" }).unwrap();
        assert!(url.contains("/episodes/..%2Fx/"), "{url}");
    }

    #[test]
    fn updates_carry_timestamp() {
        let url = catalog().url(Endpoint::UpdatedSince { since: 1700000000 }).unwrap();
        assert_eq!(url, "https://example.test/api/Updates.php?type=all&time=1700000000");
    }

    #[test]
    fn bad_base_url_is_invalid_argument() {
        let mut config = ClientConfig::new("KEY");
        config.base_url = "not a url".into();
        let err = Catalog::new(&config).url(Endpoint::ServerTime).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn web_url_for_show() {
        let show = Show::new("80379", "x").with_language(Some("en".into()));
        assert_eq!(
            catalog_url_for_show(&show),
            "https://thetvdb.com/?tab=series&id=80379&lid=en"
        );
    }
}
