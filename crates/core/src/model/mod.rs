mod actor;
mod episode;
mod image;
mod show;

pub use actor::Actor;
pub use episode::Episode;
pub use image::{Image, ImageKind};
pub use show::{BasicStatus, EpisodeSummary, Show, ShowStatus};

const IMDB_TITLE_BASE: &str = "https://www.imdb.com/title";

/// Empty text carries no information and is stored as absent.
pub(crate) fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}

pub(crate) fn finite(rating: Option<f64>) -> Option<f64> {
    rating.filter(|r| r.is_finite())
}

pub(crate) fn imdb_url(imdb_id: Option<&str>) -> Option<String> {
    imdb_id.map(|id| format!("{IMDB_TITLE_BASE}/{id}/"))
}
