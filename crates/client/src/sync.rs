//! Synchronization engine.
//!
//! Fetches shows and their sub-resources through the [`Orchestrator`],
//! decides from the watermark which local entities need a refresh, and merges
//! fresh data into the caller's graph. Per entity the state moves
//! `Unfetched -> Fetching -> Merged | Failed`; shows the changed-since list
//! leaves out go straight to `Skipped`.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use showsync_core::ordering;
use showsync_core::{Actor, CatalogError, Episode, Image, MergeOptions, Show};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Endpoint};
use crate::mapping::{self, UpdatedIds};
use crate::orchestrator::{BatchKey, BatchOutcome, Orchestrator};
use crate::transport::Transport;

/// Sub-resources fetched alongside a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShowInclude {
    pub episodes: bool,
    pub images: bool,
    pub actors: bool,
}

impl ShowInclude {
    pub fn all() -> Self {
        Self {
            episodes: true,
            images: true,
            actors: true,
        }
    }

    fn flags(self) -> [(&'static str, bool); 3] {
        [
            ("episodes", self.episodes),
            ("images", self.images),
            ("actors", self.actors),
        ]
    }
}

/// Flags for [`SyncEngine::update_shows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Only update shows the catalog reports as changed since the watermark.
    pub check_if_needed: bool,
    pub episodes: bool,
    pub images: bool,
    pub actors: bool,
    pub replace_artwork: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            check_if_needed: true,
            episodes: true,
            images: true,
            actors: true,
            replace_artwork: false,
        }
    }
}

impl UpdateOptions {
    pub fn include(&self) -> ShowInclude {
        ShowInclude {
            episodes: self.episodes,
            images: self.images,
            actors: self.actors,
        }
    }

    fn merge(&self) -> MergeOptions {
        MergeOptions {
            episodes: self.episodes,
            images: self.images,
            actors: self.actors,
            replace_artwork: self.replace_artwork,
        }
    }
}

/// Where one entity ended up in a synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Unfetched,
    Fetching,
    Merged,
    /// Not in the changed-since list; left as is.
    Skipped,
    /// The local entity was left untouched.
    Failed(CatalogError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub entries: Vec<(String, SyncState)>,
}

impl SyncReport {
    fn failed_all(ids: Vec<String>, err: &CatalogError) -> Self {
        Self {
            entries: ids
                .into_iter()
                .map(|id| (id, SyncState::Failed(err.clone())))
                .collect(),
        }
    }

    /// True when no entity failed.
    pub fn succeeded(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, state)| matches!(state, SyncState::Merged | SyncState::Skipped))
    }

    pub fn count(&self, wanted: fn(&SyncState) -> bool) -> usize {
        self.entries.iter().filter(|(_, s)| wanted(s)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CatalogError)> {
        self.entries.iter().filter_map(|(id, state)| match state {
            SyncState::Failed(err) => Some((id.as_str(), err)),
            _ => None,
        })
    }
}

/// Ids the catalog considers changed since the watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdsToUpdate {
    /// No watermark yet: every entity is due.
    All,
    Only(HashSet<String>),
}

impl IdsToUpdate {
    pub fn contains(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
        }
    }
}

impl BatchKey {
    pub fn search(name: &str) -> Self {
        Self::new("search", &[name.trim()], &[])
    }

    pub fn shows<S: AsRef<str>>(ids: &[S], include: ShowInclude) -> Self {
        Self::new("shows", ids, &include.flags())
    }

    pub fn episodes<S: AsRef<str>>(ids: &[S]) -> Self {
        Self::new("episodes", ids, &[])
    }

    pub fn episode_by_number(show_id: &str, season: u32, number: u32) -> Self {
        Self::new("episode_by_number", &[format!("{show_id}/{season}/{number}")], &[])
    }

    pub fn images(show_id: &str) -> Self {
        Self::new("images", &[show_id], &[])
    }

    pub fn actors(show_id: &str) -> Self {
        Self::new("actors", &[show_id], &[])
    }

    pub fn update_shows<S: AsRef<str>>(ids: &[S], include: ShowInclude) -> Self {
        Self::new("update_shows", ids, &include.flags())
    }

    pub fn update_episodes<S: AsRef<str>>(ids: &[S]) -> Self {
        Self::new("update_episodes", ids, &[])
    }

    pub fn changed_since(scope: &str) -> Self {
        Self::new("changed_since", &[scope], &[])
    }
}

pub struct SyncEngine {
    catalog: Catalog,
    transport: Arc<dyn Transport>,
    orchestrator: Orchestrator,
    watermark: RwLock<Option<i64>>,
    /// Catalog time of the earliest changed-since lookup since the last refresh.
    pending_watermark: RwLock<Option<i64>>,
}

impl SyncEngine {
    pub fn new(catalog: Catalog, transport: Arc<dyn Transport>, orchestrator: Orchestrator) -> Self {
        Self {
            catalog,
            transport,
            orchestrator,
            watermark: RwLock::new(None),
            pending_watermark: RwLock::new(None),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    async fn fetch_json(&self, endpoint: Endpoint<'_>, cancel: &CancellationToken) -> Result<Value, CatalogError> {
        let url = self.catalog.url(endpoint)?;
        debug!(endpoint = endpoint.kind(), url = %url, "catalog fetch");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CatalogError::Cancelled),
            result = self.transport.fetch(&url, cancel) => result,
        }
    }

    /// Shows matching `name`, one per id, preferring records in the client
    /// language, in the order the catalog first lists each id.
    pub async fn search(&self, name: &str) -> Result<Vec<Show>, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidArgument("show name is empty".into()));
        }

        let batch = self.orchestrator.begin(BatchKey::search(name));
        let payload = self
            .fetch_json(Endpoint::SearchByName { name }, batch.token())
            .await?;
        let shows = mapping::parse_search(&payload, self.catalog.artwork_base_url());
        let found = shows.len();
        let shows = prefer_language(shows, self.catalog.language());
        info!(name = %name, found, kept = shows.len(), "search finished");
        Ok(shows)
    }

    async fn fetch_show(&self, id: String, include: ShowInclude, cancel: CancellationToken) -> Result<Show, CatalogError> {
        let base = async {
            let endpoint = if include.episodes {
                Endpoint::ShowAll { id: &id }
            } else {
                Endpoint::Show { id: &id }
            };
            let payload = self.fetch_json(endpoint, &cancel).await?;
            mapping::parse_show(&payload, self.catalog.artwork_base_url())
        };
        let images = async {
            if include.images {
                self.fetch_images(&id, &cancel).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let actors = async {
            if include.actors {
                self.fetch_actors(&id, &cancel).await.map(Some)
            } else {
                Ok(None)
            }
        };

        let (mut show, images, actors) = tokio::try_join!(base, images, actors)?;
        if let Some(images) = images {
            show = show.with_images(images);
        }
        if let Some(actors) = actors {
            show = show.with_actors(actors);
        }
        debug!(
            show_id = %id,
            episodes = show.episodes().len(),
            images = show.images().len(),
            actors = show.actors().len(),
            "show fetched"
        );
        Ok(show)
    }

    async fn fetch_images(&self, show_id: &str, cancel: &CancellationToken) -> Result<Vec<Image>, CatalogError> {
        let payload = self.fetch_json(Endpoint::ImagesForShow { id: show_id }, cancel).await?;
        let mut images = mapping::parse_images(&payload, self.catalog.artwork_base_url())?;
        images.sort_by(ordering::image_cmp);
        images.dedup_by(|a, b| a.same_identity(b));
        Ok(images)
    }

    async fn fetch_actors(&self, show_id: &str, cancel: &CancellationToken) -> Result<Vec<Actor>, CatalogError> {
        let payload = self.fetch_json(Endpoint::ActorsForShow { id: show_id }, cancel).await?;
        let mut actors = mapping::parse_actors(&payload, self.catalog.artwork_base_url())?;
        actors.sort_by(ordering::actor_cmp);
        Ok(actors)
    }

    async fn fetch_episode(&self, id: String, cancel: CancellationToken) -> Result<Episode, CatalogError> {
        let payload = self.fetch_json(Endpoint::Episode { id: &id }, &cancel).await?;
        mapping::parse_episode(&payload, self.catalog.artwork_base_url())
    }

    /// Full shows for `ids`, in input order. A show whose requested
    /// sub-resource failed is reported as failed.
    pub async fn fetch_shows(&self, ids: &[String], include: ShowInclude) -> BatchOutcome<Show> {
        self.orchestrator
            .fetch_many(BatchKey::shows(ids, include), ids, |id, cancel| {
                self.fetch_show(id, include, cancel)
            })
            .await
    }

    pub async fn fetch_episodes(&self, ids: &[String]) -> BatchOutcome<Episode> {
        self.orchestrator
            .fetch_many(BatchKey::episodes(ids), ids, |id, cancel| {
                self.fetch_episode(id, cancel)
            })
            .await
    }

    pub async fn episode_by_number(&self, show_id: &str, season: u32, number: u32) -> Result<Episode, CatalogError> {
        let batch = self
            .orchestrator
            .begin(BatchKey::episode_by_number(show_id, season, number));
        let payload = self
            .fetch_json(
                Endpoint::EpisodeByNumber {
                    show_id,
                    season,
                    number,
                },
                batch.token(),
            )
            .await?;
        mapping::parse_episode(&payload, self.catalog.artwork_base_url())
    }

    pub async fn images_for_show(&self, show_id: &str) -> Result<Vec<Image>, CatalogError> {
        let batch = self.orchestrator.begin(BatchKey::images(show_id));
        self.fetch_images(show_id, batch.token()).await
    }

    pub async fn actors_for_show(&self, show_id: &str) -> Result<Vec<Actor>, CatalogError> {
        let batch = self.orchestrator.begin(BatchKey::actors(show_id));
        self.fetch_actors(show_id, batch.token()).await
    }

    async fn changed_since(&self, cancel: &CancellationToken) -> Result<Option<UpdatedIds>, CatalogError> {
        let Some(since) = self.last_update_timestamp() else {
            return Ok(None);
        };
        let payload = self.fetch_json(Endpoint::UpdatedSince { since }, cancel).await?;
        let updates = mapping::parse_updates(&payload)?;
        if let Some(time) = updates.server_time {
            let mut pending = self.pending_watermark.write().unwrap_or_else(|e| e.into_inner());
            *pending = Some(pending.map_or(time, |earliest| earliest.min(time)));
        }
        debug!(
            since,
            shows = updates.shows.len(),
            episodes = updates.episodes.len(),
            "changed-since list"
        );
        Ok(Some(updates))
    }

    pub async fn shows_ids_to_update(&self) -> Result<IdsToUpdate, CatalogError> {
        let batch = self.orchestrator.begin(BatchKey::changed_since("shows"));
        Ok(match self.changed_since(batch.token()).await? {
            Some(updates) => IdsToUpdate::Only(updates.shows),
            None => IdsToUpdate::All,
        })
    }

    pub async fn episodes_ids_to_update(&self) -> Result<IdsToUpdate, CatalogError> {
        let batch = self.orchestrator.begin(BatchKey::changed_since("episodes"));
        Ok(match self.changed_since(batch.token()).await? {
            Some(updates) => IdsToUpdate::Only(updates.episodes),
            None => IdsToUpdate::All,
        })
    }

    /// Refresh `shows` in place. Skipped shows are not touched at all, artwork
    /// included. Failed shows keep their previous state.
    pub async fn update_shows(&self, shows: &mut [Show], opts: UpdateOptions) -> SyncReport {
        if shows.is_empty() {
            return SyncReport::default();
        }
        let ids: Vec<String> = shows.iter().map(|s| s.id().to_string()).collect();
        let include = opts.include();
        let batch = self.orchestrator.begin(BatchKey::update_shows(&ids, include));

        let wanted = if opts.check_if_needed {
            match self.changed_since(batch.token()).await {
                Ok(Some(updates)) => IdsToUpdate::Only(updates.shows),
                Ok(None) => IdsToUpdate::All,
                Err(err) => {
                    warn!(error = %err, shows = ids.len(), "changed-since lookup failed");
                    return SyncReport::failed_all(ids, &err);
                }
            }
        } else {
            IdsToUpdate::All
        };

        let mut states = vec![SyncState::Unfetched; shows.len()];
        let mut due = Vec::new();
        for (state, id) in states.iter_mut().zip(&ids) {
            if wanted.contains(id) {
                *state = SyncState::Fetching;
                due.push(id.clone());
            } else {
                *state = SyncState::Skipped;
            }
        }

        let outcome = self
            .orchestrator
            .run(&batch, &due, |id, cancel| self.fetch_show(id, include, cancel))
            .await;
        let mut fetched = outcome.slots.into_iter();

        for (show, state) in shows.iter_mut().zip(states.iter_mut()) {
            if *state != SyncState::Fetching {
                continue;
            }
            match fetched.next().flatten() {
                Some(fresh) => {
                    show.merge_from(fresh, opts.merge());
                    *state = SyncState::Merged;
                }
                None => {
                    let err = outcome
                        .errors
                        .get(show.id())
                        .cloned()
                        .unwrap_or(CatalogError::Cancelled);
                    warn!(show_id = %show.id(), error = %err, "show update failed");
                    *state = SyncState::Failed(err);
                }
            }
        }

        let report = SyncReport {
            entries: ids.into_iter().zip(states).collect(),
        };
        info!(
            batch = %batch.key(),
            merged = report.count(|s| matches!(s, SyncState::Merged)),
            skipped = report.count(|s| matches!(s, SyncState::Skipped)),
            failed = report.count(|s| matches!(s, SyncState::Failed(_))),
            "shows updated"
        );
        report
    }

    /// Refresh standalone episodes in place, keeping their `seen` flags.
    pub async fn update_episodes(&self, episodes: &mut [Episode], check_if_needed: bool) -> SyncReport {
        if episodes.is_empty() {
            return SyncReport::default();
        }
        let ids: Vec<String> = episodes.iter().map(|e| e.id().to_string()).collect();
        let batch = self.orchestrator.begin(BatchKey::update_episodes(&ids));

        let wanted = if check_if_needed {
            match self.changed_since(batch.token()).await {
                Ok(Some(updates)) => IdsToUpdate::Only(updates.episodes),
                Ok(None) => IdsToUpdate::All,
                Err(err) => {
                    warn!(error = %err, episodes = ids.len(), "changed-since lookup failed");
                    return SyncReport::failed_all(ids, &err);
                }
            }
        } else {
            IdsToUpdate::All
        };

        let due: Vec<String> = ids.iter().filter(|id| wanted.contains(id)).cloned().collect();
        let outcome = self
            .orchestrator
            .run(&batch, &due, |id, cancel| self.fetch_episode(id, cancel))
            .await;
        let mut fetched = outcome.slots.into_iter();

        let mut entries = Vec::with_capacity(episodes.len());
        for episode in episodes.iter_mut() {
            let id = episode.id().to_string();
            if !wanted.contains(&id) {
                entries.push((id, SyncState::Skipped));
                continue;
            }
            let state = match fetched.next().flatten() {
                Some(fresh) => {
                    episode.merge_from(fresh);
                    SyncState::Merged
                }
                None => {
                    let err = outcome.errors.get(&id).cloned().unwrap_or(CatalogError::Cancelled);
                    warn!(episode_id = %id, error = %err, "episode update failed");
                    SyncState::Failed(err)
                }
            };
            entries.push((id, state));
        }

        let report = SyncReport { entries };
        info!(
            batch = %batch.key(),
            merged = report.count(|s| matches!(s, SyncState::Merged)),
            failed = report.count(|s| matches!(s, SyncState::Failed(_))),
            "episodes updated"
        );
        report
    }

    pub async fn server_time(&self) -> Result<i64, CatalogError> {
        let batch = self.orchestrator.begin(BatchKey::new("server_time", &[] as &[&str], &[]));
        let payload = self.fetch_json(Endpoint::ServerTime, batch.token()).await?;
        mapping::parse_server_time(&payload)
    }

    pub fn last_update_timestamp(&self) -> Option<i64> {
        *self.watermark.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_last_update_timestamp(&self, timestamp: Option<i64>) {
        *self.watermark.write().unwrap_or_else(|e| e.into_inner()) = timestamp;
    }

    /// Advance the watermark on the catalog's clock: to the time of the
    /// earliest changed-since lookup since the last refresh, or to the
    /// catalog's current time when there was none. Never called implicitly.
    pub async fn refresh_last_update_timestamp(&self) -> Result<i64, CatalogError> {
        let pending = self.pending_watermark.write().unwrap_or_else(|e| e.into_inner()).take();
        let time = match pending {
            Some(time) => time,
            None => self.server_time().await?,
        };
        self.set_last_update_timestamp(Some(time));
        debug!(watermark = time, from_lookup = pending.is_some(), "last update timestamp refreshed");
        Ok(time)
    }
}

/// One show per id: the record in `language` when the catalog has one,
/// otherwise the first record seen. Output follows first appearance.
fn prefer_language(shows: Vec<Show>, language: &str) -> Vec<Show> {
    let mut kept: Vec<Show> = Vec::with_capacity(shows.len());
    for show in shows {
        match kept.iter_mut().find(|k| k.id() == show.id()) {
            Some(existing) => {
                if existing.language() != Some(language) && show.language() == Some(language) {
                    *existing = show;
                }
            }
            None => kept.push(show),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_preference_dedupes_in_first_seen_order() {
        let shows = vec![
            Show::new("1", "Uno").with_language(Some("es".into())),
            Show::new("2", "Two").with_language(Some("de".into())),
            Show::new("1", "One").with_language(Some("en".into())),
            Show::new("1", "Eins").with_language(Some("de".into())),
        ];
        let kept = prefer_language(shows, "en");
        let names: Vec<&str> = kept.iter().map(Show::name).collect();
        assert_eq!(names, ["One", "Two"]);
    }

    #[test]
    fn ids_to_update_all_contains_everything() {
        assert!(IdsToUpdate::All.contains("anything"));
        let only = IdsToUpdate::Only(HashSet::from(["1".to_string()]));
        assert!(only.contains("1"));
        assert!(!only.contains("2"));
    }

    #[test]
    fn report_success_ignores_skips() {
        let report = SyncReport {
            entries: vec![
                ("1".into(), SyncState::Merged),
                ("2".into(), SyncState::Skipped),
            ],
        };
        assert!(report.succeeded());

        let failed = SyncReport::failed_all(vec!["1".into()], &CatalogError::Transport("down".into()));
        assert!(!failed.succeeded());
        assert_eq!(failed.failures().count(), 1);
    }

    #[test]
    fn update_keys_track_flags() {
        let ids = ["1", "2"];
        let a = BatchKey::update_shows(&ids, ShowInclude::all());
        let b = BatchKey::update_shows(&["2", "1"], ShowInclude::all());
        let c = BatchKey::update_shows(&ids, ShowInclude::default());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, BatchKey::shows(&ids, ShowInclude::all()));
    }
}
