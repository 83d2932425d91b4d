use chrono::NaiveDate;

use super::{finite, non_empty};

/// A single episode of a show.
///
/// Everything except `seen` comes from the remote catalog and is only
/// rewritten by a merge. `seen` belongs to the caller and survives merges.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    id: String,
    title: Option<String>,
    season_number: u32,
    episode_number: u32,
    aired_date: Option<NaiveDate>,
    rating: Option<f64>,
    rating_count: Option<u32>,
    overview: Option<String>,
    artwork_url: Option<String>,
    imdb_id: Option<String>,
    language: Option<String>,
    show_id: Option<String>,
    writers: Vec<String>,
    directors: Vec<String>,
    guest_stars: Vec<String>,
    seen: bool,
}

impl Episode {
    pub fn new(id: impl Into<String>, season_number: u32, episode_number: u32) -> Self {
        Self {
            id: id.into(),
            title: None,
            season_number,
            episode_number,
            aired_date: None,
            rating: None,
            rating_count: None,
            overview: None,
            artwork_url: None,
            imdb_id: None,
            language: None,
            show_id: None,
            writers: Vec::new(),
            directors: Vec::new(),
            guest_stars: Vec::new(),
            seen: false,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = non_empty(title);
        self
    }

    pub fn with_aired_date(mut self, date: Option<NaiveDate>) -> Self {
        self.aired_date = date;
        self
    }

    pub fn with_rating(mut self, rating: Option<f64>, count: Option<u32>) -> Self {
        self.rating = finite(rating);
        self.rating_count = count;
        self
    }

    pub fn with_overview(mut self, overview: Option<String>) -> Self {
        self.overview = non_empty(overview);
        self
    }

    pub fn with_artwork_url(mut self, url: Option<String>) -> Self {
        self.artwork_url = non_empty(url);
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

    pub fn with_show_id(mut self, show_id: Option<String>) -> Self {
        self.show_id = non_empty(show_id);
        self
    }

    pub fn with_credits(
        mut self,
        writers: Vec<String>,
        directors: Vec<String>,
        guest_stars: Vec<String>,
    ) -> Self {
        self.writers = writers;
        self.directors = directors;
        self.guest_stars = guest_stars;
        self
    }

    pub fn with_seen(mut self, seen: bool) -> Self {
        self.seen = seen;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn season_number(&self) -> u32 {
        self.season_number
    }

    pub fn episode_number(&self) -> u32 {
        self.episode_number
    }

    /// Season 0 holds the specials.
    pub fn is_special(&self) -> bool {
        self.season_number == 0
    }

    pub fn aired_date(&self) -> Option<NaiveDate> {
        self.aired_date
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn rating_count(&self) -> Option<u32> {
        self.rating_count
    }

    pub fn overview(&self) -> Option<&str> {
        self.overview.as_deref()
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
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

    /// Id of the owning show. Resolve it through the show's own collection,
    /// see [`crate::Show::owns`].
    pub fn show_id(&self) -> Option<&str> {
        self.show_id.as_deref()
    }

    pub fn writers(&self) -> &[String] {
        &self.writers
    }

    pub fn directors(&self) -> &[String] {
        &self.directors
    }

    pub fn guest_stars(&self) -> &[String] {
        &self.guest_stars
    }

    pub fn seen(&self) -> bool {
        self.seen
    }

    pub fn set_seen(&mut self, seen: bool) {
        self.seen = seen;
    }

    /// An episode without an air date has not aired.
    pub fn has_already_aired(&self, today: NaiveDate) -> bool {
        self.aired_date.is_some_and(|d| d <= today)
    }

    /// Replace every remote field with the fetched copy's, keeping `seen`.
    pub(crate) fn absorb(&mut self, fetched: Episode) {
        let seen = self.seen;
        *self = fetched;
        self.seen = seen;
    }

    pub(crate) fn attach_to(&mut self, show_id: &str) {
        self.show_id = Some(show_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn aired_is_inclusive_of_today() {
        let ep = Episode::new("1", 1, 1).with_aired_date(Some(date(2024, 3, 1)));
        assert!(ep.has_already_aired(date(2024, 3, 1)));
        assert!(ep.has_already_aired(date(2024, 3, 2)));
        assert!(!ep.has_already_aired(date(2024, 2, 29)));
    }

    #[test]
    fn undated_episode_has_not_aired() {
        let ep = Episode::new("1", 1, 1);
        assert!(!ep.has_already_aired(date(2100, 1, 1)));
    }

    #[test]
    fn absorb_keeps_seen_flag() {
        let mut local = Episode::new("7", 1, 3)
            .with_title(Some("Old".into()))
            .with_seen(true);
        let fetched = Episode::new("7", 1, 4).with_title(Some("New".into()));

        local.absorb(fetched);

        assert!(local.seen());
        assert_eq!(local.title(), Some("New"));
        assert_eq!(local.episode_number(), 4);
    }

    #[test]
    fn imdb_url_from_id() {
        let ep = Episode::new("1", 1, 1).with_imdb_id(Some("tt1635958".into()));
        assert_eq!(ep.imdb_url().as_deref(), Some("https://www.imdb.com/title/tt1635958/"));
    }
}
