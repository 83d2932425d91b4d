use super::{finite, non_empty};

/// Artwork category. The order of the variants is the display precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Fanart,
    Poster,
    Season,
    Banner,
    Unknown,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fanart => "fanart",
            Self::Poster => "poster",
            Self::Season => "season",
            Self::Banner => "banner",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse: anything unrecognised is `Unknown`. The catalog calls
    /// banners `series`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fanart" => Self::Fanart,
            "poster" => Self::Poster,
            "season" | "seasonwide" => Self::Season,
            "banner" | "series" => Self::Banner,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn precedence(self) -> u8 {
        match self {
            Self::Fanart => 0,
            Self::Poster => 1,
            Self::Season => 2,
            Self::Banner => 3,
            Self::Unknown => 4,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of show artwork. Images carry no id; `(kind, url)` identifies one.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    kind: ImageKind,
    url: String,
    thumbnail_url: Option<String>,
    rating: Option<f64>,
    rating_count: Option<u32>,
}

impl Image {
    pub fn new(kind: ImageKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            thumbnail_url: None,
            rating: None,
            rating_count: None,
        }
    }

    pub fn with_thumbnail_url(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = non_empty(url);
        self
    }

    pub fn with_rating(mut self, rating: Option<f64>, count: Option<u32>) -> Self {
        self.rating = finite(rating);
        self.rating_count = count;
        self
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn rating_count(&self) -> Option<u32> {
        self.rating_count
    }

    pub fn same_identity(&self, other: &Image) -> bool {
        self.kind == other.kind && self.url == other.url
    }

    pub(crate) fn absorb(&mut self, fetched: Image) {
        self.thumbnail_url = fetched.thumbnail_url;
        self.rating = fetched.rating;
        self.rating_count = fetched.rating_count;
    }
}
