use std::sync::Arc;

use showsync_core::{Actor, CatalogError, Episode, Image, Show};
use tracing::info;

use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::orchestrator::{BatchKey, BatchOutcome, Orchestrator};
use crate::sync::{IdsToUpdate, ShowInclude, SyncEngine, SyncReport, UpdateOptions};
use crate::transport::{HttpTransport, Transport};

/// Entry point for every catalog operation.
///
/// Argument errors (blank names or ids) are returned before any request is
/// made. Batch operations return a [`BatchOutcome`] whose errors are keyed by
/// id; one failing id never aborts its siblings.
pub struct CatalogClient {
    config: ClientConfig,
    engine: SyncEngine,
}

impl CatalogClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let engine = SyncEngine::new(
            Catalog::new(&config),
            transport,
            Orchestrator::new(config.max_concurrent_requests),
        );
        info!(
            language = %engine.catalog().language(),
            max_concurrent = ?config.max_concurrent_requests,
            "catalog client ready"
        );
        Self { config, engine }
    }

    /// Client over HTTP with the configured timeout.
    pub fn with_http(config: ClientConfig) -> Result<Self, CatalogError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn shows_with_name(&self, name: &str) -> Result<Vec<Show>, CatalogError> {
        self.engine.search(name).await
    }

    pub async fn shows_with_ids<S: AsRef<str>>(
        &self,
        ids: &[S],
        include: ShowInclude,
    ) -> Result<BatchOutcome<Show>, CatalogError> {
        let ids = validate_ids(ids, "show")?;
        Ok(self.engine.fetch_shows(&ids, include).await)
    }

    pub async fn episodes_with_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<BatchOutcome<Episode>, CatalogError> {
        let ids = validate_ids(ids, "episode")?;
        Ok(self.engine.fetch_episodes(&ids).await)
    }

    pub async fn episode_by_season_and_number(
        &self,
        show_id: &str,
        season: u32,
        number: u32,
    ) -> Result<Episode, CatalogError> {
        let show_id = validate_id(show_id, "show")?;
        self.engine.episode_by_number(show_id, season, number).await
    }

    /// Images of a show, in display order.
    pub async fn images_for_show(&self, show_id: &str) -> Result<Vec<Image>, CatalogError> {
        self.engine.images_for_show(validate_id(show_id, "show")?).await
    }

    /// Actors of a show, most prominent first.
    pub async fn actors_for_show(&self, show_id: &str) -> Result<Vec<Actor>, CatalogError> {
        self.engine.actors_for_show(validate_id(show_id, "show")?).await
    }

    /// Update `shows` in place. `true` when no show failed.
    pub async fn update_shows(&self, shows: &mut [Show], opts: UpdateOptions) -> bool {
        self.update_shows_report(shows, opts).await.succeeded()
    }

    pub async fn update_shows_report(&self, shows: &mut [Show], opts: UpdateOptions) -> SyncReport {
        self.engine.update_shows(shows, opts).await
    }

    /// Update standalone episodes in place. `true` when no episode failed.
    pub async fn update_episodes(&self, episodes: &mut [Episode], check_if_needed: bool) -> bool {
        self.update_episodes_report(episodes, check_if_needed)
            .await
            .succeeded()
    }

    pub async fn update_episodes_report(&self, episodes: &mut [Episode], check_if_needed: bool) -> SyncReport {
        self.engine.update_episodes(episodes, check_if_needed).await
    }

    pub async fn shows_ids_to_update(&self) -> Result<IdsToUpdate, CatalogError> {
        self.engine.shows_ids_to_update().await
    }

    pub async fn episodes_ids_to_update(&self) -> Result<IdsToUpdate, CatalogError> {
        self.engine.episodes_ids_to_update().await
    }

    /// The catalog's clock, as a unix timestamp.
    pub async fn server_time(&self) -> Result<i64, CatalogError> {
        self.engine.server_time().await
    }

    /// Mark everything fetched so far as current. Call after an update the
    /// caller considers durable. The new watermark comes from the catalog's
    /// clock, never the local one.
    pub async fn refresh_last_update_timestamp(&self) -> Result<i64, CatalogError> {
        self.engine.refresh_last_update_timestamp().await
    }

    pub fn last_update_timestamp(&self) -> Option<i64> {
        self.engine.last_update_timestamp()
    }

    /// Restore a watermark persisted by the caller.
    pub fn set_last_update_timestamp(&self, timestamp: Option<i64>) {
        self.engine.set_last_update_timestamp(timestamp);
    }

    pub fn cancel_shows_with_name(&self, name: &str) -> bool {
        self.engine.orchestrator().cancel(&BatchKey::search(name))
    }

    pub fn cancel_shows_with_ids<S: AsRef<str>>(&self, ids: &[S], include: ShowInclude) -> bool {
        self.engine.orchestrator().cancel(&BatchKey::shows(ids, include))
    }

    pub fn cancel_episodes_with_ids<S: AsRef<str>>(&self, ids: &[S]) -> bool {
        self.engine.orchestrator().cancel(&BatchKey::episodes(ids))
    }

    pub fn cancel_update_of_shows(&self, shows: &[Show], include: ShowInclude) -> bool {
        let ids: Vec<&str> = shows.iter().map(Show::id).collect();
        self.engine.orchestrator().cancel(&BatchKey::update_shows(&ids, include))
    }

    pub fn cancel_update_of_episodes(&self, episodes: &[Episode]) -> bool {
        let ids: Vec<&str> = episodes.iter().map(Episode::id).collect();
        self.engine.orchestrator().cancel(&BatchKey::update_episodes(&ids))
    }

    pub fn cancel_all(&self) {
        self.engine.orchestrator().cancel_all();
    }
}

fn validate_id<'a>(id: &'a str, what: &str) -> Result<&'a str, CatalogError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CatalogError::InvalidArgument(format!("empty {what} id")));
    }
    Ok(id)
}

fn validate_ids<S: AsRef<str>>(ids: &[S], what: &str) -> Result<Vec<String>, CatalogError> {
    ids.iter()
        .map(|id| validate_id(id.as_ref(), what).map(str::to_string))
        .collect()
}
