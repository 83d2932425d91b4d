use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::NaiveDate;

use super::{Actor, Episode, Image, ImageKind, finite, non_empty};
use crate::ordering;

/// Airing status as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasicStatus {
    #[default]
    Unknown,
    Continuing,
    Ended,
}

impl BasicStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Continuing => "continuing",
            Self::Ended => "ended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unknown" | "" => Some(Self::Unknown),
            "continuing" => Some(Self::Continuing),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

impl std::fmt::Display for BasicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status derived from the catalog status and the episode air dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowStatus {
    #[default]
    Unknown,
    /// The next air date is known.
    Upcoming,
    /// Still running, next air date not announced.
    Tba,
    Ended,
}

impl ShowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Upcoming => "upcoming",
            Self::Tba => "tba",
            Self::Ended => "ended",
        }
    }
}

/// Time-dependent facts about a show's episodes, relative to one day.
///
/// Episodes are referenced by id and resolved through the owning show. Specials
/// are not taken into account.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EpisodeSummary {
    pub computed_for: Option<NaiveDate>,
    pub last_episode: Option<String>,
    pub next_episode: Option<String>,
    pub days_to_next_episode: Option<i64>,
    pub active_episode: Option<String>,
    pub episodes_behind: usize,
    pub number_of_seasons: usize,
    pub started: bool,
    pub finished: bool,
    pub active: bool,
    pub status: ShowStatus,
}

impl EpisodeSummary {
    fn compute(show: &Show, today: NaiveDate) -> Self {
        let regular: Vec<&Episode> = show.episodes.iter().filter(|e| !e.is_special()).collect();

        let last_episode = regular
            .iter()
            .filter(|e| e.has_already_aired(today))
            .max_by(|a, b| {
                a.aired_date()
                    .cmp(&b.aired_date())
                    .then_with(|| ordering::episode_cmp(a, b, false))
            })
            .map(|e| e.id().to_string());

        let next = regular
            .iter()
            .filter(|e| e.aired_date().is_some_and(|d| d > today))
            .min_by(|a, b| {
                a.aired_date()
                    .cmp(&b.aired_date())
                    .then_with(|| ordering::episode_cmp(a, b, false))
            });
        let days_to_next_episode = next
            .and_then(|e| e.aired_date())
            .map(|d| (d - today).num_days());

        let pending: Vec<&&Episode> = regular
            .iter()
            .filter(|e| e.has_already_aired(today) && !e.seen())
            .collect();

        let started = regular.iter().any(|e| e.has_already_aired(today));
        let active = regular.iter().any(|e| e.seen());
        let status = match (show.basic_status, next.is_some()) {
            (BasicStatus::Ended, _) => ShowStatus::Ended,
            (_, true) => ShowStatus::Upcoming,
            (BasicStatus::Continuing, false) => ShowStatus::Tba,
            (BasicStatus::Unknown, false) => ShowStatus::Unknown,
        };
        let seasons: BTreeSet<u32> = regular.iter().map(|e| e.season_number()).collect();

        Self {
            computed_for: Some(today),
            last_episode,
            next_episode: next.map(|e| e.id().to_string()),
            days_to_next_episode,
            active_episode: pending.first().map(|e| e.id().to_string()),
            episodes_behind: pending.len(),
            number_of_seasons: seasons.len(),
            started,
            finished: status == ShowStatus::Ended && started && pending.is_empty(),
            active,
            status,
        }
    }
}

/// Lazily filled summary slot. Never part of a show's identity.
#[derive(Debug, Clone, Default)]
struct SummaryCache(OnceLock<EpisodeSummary>);

impl PartialEq for SummaryCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// A show and everything it owns.
///
/// Episodes, images and actors are unique by identity within a show and are
/// kept in their canonical order (see [`crate::ordering`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Show {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) overview: Option<String>,
    pub(crate) premiere_date: Option<NaiveDate>,
    pub(crate) imdb_id: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) air_day: Option<String>,
    pub(crate) air_time: Option<String>,
    pub(crate) content_rating: Option<String>,
    pub(crate) network: Option<String>,
    pub(crate) runtime: Option<u32>,
    pub(crate) rating: Option<f64>,
    pub(crate) rating_count: Option<u32>,
    pub(crate) genres: Vec<String>,
    pub(crate) actors_names: Vec<String>,
    pub(crate) basic_status: BasicStatus,
    pub(crate) banner_url: Option<String>,
    pub(crate) poster_url: Option<String>,
    pub(crate) fanart_url: Option<String>,
    pub(crate) episodes: Vec<Episode>,
    pub(crate) images: Vec<Image>,
    pub(crate) actors: Vec<Actor>,
    summary: SummaryCache,
}

impl Show {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            overview: None,
            premiere_date: None,
            imdb_id: None,
            language: None,
            air_day: None,
            air_time: None,
            content_rating: None,
            network: None,
            runtime: None,
            rating: None,
            rating_count: None,
            genres: Vec::new(),
            actors_names: Vec::new(),
            basic_status: BasicStatus::Unknown,
            banner_url: None,
            poster_url: None,
            fanart_url: None,
            episodes: Vec::new(),
            images: Vec::new(),
            actors: Vec::new(),
            summary: SummaryCache::default(),
        }
    }

    pub fn with_overview(mut self, overview: Option<String>) -> Self {
        self.overview = non_empty(overview);
        self
    }

    pub fn with_premiere_date(mut self, date: Option<NaiveDate>) -> Self {
        self.premiere_date = date;
        self
    }

    pub fn with_imdb_id(mut self, imdb_id: Option<String>) -> Self {
        self.imdb_id = non_empty(imdb_id);
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = non_empty(language);
        self
    }

    pub fn with_airs(mut self, air_day: Option<String>, air_time: Option<String>) -> Self {
        self.air_day = non_empty(air_day);
        self.air_time = non_empty(air_time);
        self
    }

    pub fn with_content_rating(mut self, content_rating: Option<String>) -> Self {
        self.content_rating = non_empty(content_rating);
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = non_empty(network);
        self
    }

    pub fn with_runtime(mut self, minutes: Option<u32>) -> Self {
        self.runtime = minutes;
        self
    }

    pub fn with_rating(mut self, rating: Option<f64>, count: Option<u32>) -> Self {
        self.rating = finite(rating);
        self.rating_count = count;
        self
    }

    pub fn with_genres(mut self, genres: Vec<String>) -> Self {
        self.genres = genres;
        self
    }

    pub fn with_actors_names(mut self, names: Vec<String>) -> Self {
        self.actors_names = names;
        self
    }

    pub fn with_basic_status(mut self, status: BasicStatus) -> Self {
        self.basic_status = status;
        self
    }

    pub fn with_artwork(
        mut self,
        banner_url: Option<String>,
        poster_url: Option<String>,
        fanart_url: Option<String>,
    ) -> Self {
        self.banner_url = non_empty(banner_url);
        self.poster_url = non_empty(poster_url);
        self.fanart_url = non_empty(fanart_url);
        self
    }

    pub fn with_episodes(mut self, episodes: Vec<Episode>) -> Self {
        self.episodes.clear();
        self.add_episodes(episodes);
        self
    }

    pub fn with_images(mut self, images: Vec<Image>) -> Self {
        self.images.clear();
        self.add_images(images);
        self
    }

    pub fn with_actors(mut self, actors: Vec<Actor>) -> Self {
        self.set_actors(actors);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overview(&self) -> Option<&str> {
        self.overview.as_deref()
    }

    pub fn premiere_date(&self) -> Option<NaiveDate> {
        self.premiere_date
    }

    pub fn imdb_id(&self) -> Option<&str> {
        self.imdb_id.as_deref()
    }

    pub fn imdb_url(&self) -> Option<String> {
        super::imdb_url(self.imdb_id())
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn air_day(&self) -> Option<&str> {
        self.air_day.as_deref()
    }

    pub fn air_time(&self) -> Option<&str> {
        self.air_time.as_deref()
    }

    pub fn content_rating(&self) -> Option<&str> {
        self.content_rating.as_deref()
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    pub fn runtime(&self) -> Option<u32> {
        self.runtime
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn rating_count(&self) -> Option<u32> {
        self.rating_count
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn actors_names(&self) -> &[String] {
        &self.actors_names
    }

    pub fn basic_status(&self) -> BasicStatus {
        self.basic_status
    }

    pub fn banner_url(&self) -> Option<&str> {
        self.banner_url.as_deref()
    }

    pub fn poster_url(&self) -> Option<&str> {
        self.poster_url.as_deref()
    }

    pub fn fanart_url(&self) -> Option<&str> {
        self.fanart_url.as_deref()
    }

    /// Episodes in canonical order, specials last.
    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Episodes ordered with specials either last or in their numeric place.
    pub fn episodes_ordered(&self, specials_in_order: bool) -> Vec<&Episode> {
        let mut out: Vec<&Episode> = self.episodes.iter().collect();
        out.sort_by(|a, b| ordering::episode_cmp(a, b, specials_in_order));
        out
    }

    pub fn episodes_for_season(&self, season: u32) -> Vec<&Episode> {
        self.episodes
            .iter()
            .filter(|e| e.season_number() == season)
            .collect()
    }

    pub fn episode(&self, id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id() == id)
    }

    /// Mutable access for caller-owned state such as `seen`.
    pub fn episode_mut(&mut self, id: &str) -> Option<&mut Episode> {
        self.episodes.iter_mut().find(|e| e.id() == id)
    }

    pub fn episode_by_number(&self, season: u32, number: u32) -> Option<&Episode> {
        self.episodes
            .iter()
            .find(|e| e.season_number() == season && e.episode_number() == number)
    }

    /// Whether `episode` points back at this show and is held by it.
    pub fn owns(&self, episode: &Episode) -> bool {
        episode.show_id() == Some(self.id()) && self.episode(episode.id()).is_some()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn images_of_kind(&self, kind: ImageKind) -> Vec<&Image> {
        self.images.iter().filter(|i| i.kind() == kind).collect()
    }

    pub fn fanart_images(&self) -> Vec<&Image> {
        self.images_of_kind(ImageKind::Fanart)
    }

    pub fn poster_images(&self) -> Vec<&Image> {
        self.images_of_kind(ImageKind::Poster)
    }

    pub fn season_images(&self) -> Vec<&Image> {
        self.images_of_kind(ImageKind::Season)
    }

    pub fn banner_images(&self) -> Vec<&Image> {
        self.images_of_kind(ImageKind::Banner)
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Mark every regular episode up to and including `season`x`number` as seen
    /// and every later one as unseen.
    pub fn mark_seen_through(&mut self, season: u32, number: u32) {
        for ep in self.episodes.iter_mut().filter(|e| !e.is_special()) {
            let seen = (ep.season_number(), ep.episode_number()) <= (season, number);
            ep.set_seen(seen);
        }
    }

    /// Cached summary, computed against today's date on first access.
    pub fn summary(&self) -> &EpisodeSummary {
        self.summary
            .0
            .get_or_init(|| EpisodeSummary::compute(self, chrono::Local::now().date_naive()))
    }

    /// Drop the cached summary so the next read recomputes it against "now".
    pub fn refresh_episode_information(&mut self) {
        self.summary = SummaryCache::default();
    }

    /// Recompute the cached summary for an explicit day.
    pub fn refresh_episode_information_at(&mut self, today: NaiveDate) {
        let summary = EpisodeSummary::compute(self, today);
        let cache = SummaryCache::default();
        let _ = cache.0.set(summary);
        self.summary = cache;
    }

    pub fn status(&self) -> ShowStatus {
        self.summary().status
    }

    pub fn last_episode(&self) -> Option<&Episode> {
        self.summary()
            .last_episode
            .as_deref()
            .and_then(|id| self.episode(id))
    }

    pub fn next_episode(&self) -> Option<&Episode> {
        self.summary()
            .next_episode
            .as_deref()
            .and_then(|id| self.episode(id))
    }

    pub fn days_to_next_episode(&self) -> Option<i64> {
        self.summary().days_to_next_episode
    }

    /// Next episode to watch.
    pub fn active_episode(&self) -> Option<&Episode> {
        self.summary()
            .active_episode
            .as_deref()
            .and_then(|id| self.episode(id))
    }

    pub fn number_of_episodes_behind(&self) -> usize {
        self.summary().episodes_behind
    }

    pub fn number_of_seasons(&self) -> usize {
        self.summary().number_of_seasons
    }

    pub fn has_started(&self) -> bool {
        self.summary().started
    }

    pub fn has_been_finished(&self) -> bool {
        self.summary().finished
    }

    /// At least one episode has been watched.
    pub fn is_active(&self) -> bool {
        self.summary().active
    }

    /// Insert or replace episodes by id, attaching them to this show.
    pub(crate) fn add_episodes(&mut self, episodes: Vec<Episode>) {
        for mut ep in episodes {
            ep.attach_to(&self.id);
            match self.episodes.iter_mut().find(|e| e.id() == ep.id()) {
                Some(existing) => *existing = ep,
                None => self.episodes.push(ep),
            }
        }
        self.episodes.sort_by(|a, b| ordering::episode_cmp(a, b, false));
    }

    pub(crate) fn add_images(&mut self, images: Vec<Image>) {
        for img in images {
            match self.images.iter_mut().find(|i| i.same_identity(&img)) {
                Some(existing) => *existing = img,
                None => self.images.push(img),
            }
        }
        self.images.sort_by(ordering::image_cmp);
    }

    pub(crate) fn set_actors(&mut self, actors: Vec<Actor>) {
        self.actors.clear();
        for actor in actors {
            if !self.actors.iter().any(|a| a.id() == actor.id()) {
                self.actors.push(actor);
            }
        }
        self.actors.sort_by(ordering::actor_cmp);
    }
}
