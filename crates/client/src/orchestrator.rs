//! Request orchestrator: fans one batch of ids out into concurrent fetches,
//! waits for every one of them and reassembles the results in input order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use sha2::{Digest, Sha256};
use showsync_core::CatalogError;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cancellation key of a batch, derived from everything that shapes its
/// requests. Two calls with the same scope, id set and flags share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey(String);

impl BatchKey {
    pub fn new<S: AsRef<str>>(scope: &str, ids: &[S], flags: &[(&str, bool)]) -> Self {
        let mut ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        for id in ids {
            hasher.update([0u8]);
            hasher.update(id.as_bytes());
        }
        for (name, value) in flags {
            hasher.update([1u8]);
            hasher.update(name.as_bytes());
            hasher.update([u8::from(*value)]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12])
    }
}

/// Result of one batch. `slots` lines up with the input ids: every position
/// holds either the fetched value or `None`, in which case the id is in
/// `errors`.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub slots: Vec<Option<T>>,
    pub errors: HashMap<String, CatalogError>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            errors: HashMap::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    /// Successful values in input order.
    pub fn results(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn into_results(self) -> Vec<T> {
        self.slots.into_iter().flatten().collect()
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

type Registry = Arc<Mutex<HashMap<BatchKey, Vec<(Uuid, CancellationToken)>>>>;

/// A registered, in-flight batch. Dropping it removes its cancellation entry.
pub struct Batch {
    registry: Registry,
    key: BatchKey,
    id: Uuid,
    token: CancellationToken,
}

impl Batch {
    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        let Ok(mut registry) = self.registry.lock() else {
            return;
        };
        if let Some(entries) = registry.get_mut(&self.key) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                registry.remove(&self.key);
            }
        }
    }
}

pub struct Orchestrator {
    max_concurrent: Option<usize>,
    registry: Registry,
}

impl Orchestrator {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            max_concurrent: max_concurrent.filter(|n| *n > 0),
            registry: Arc::default(),
        }
    }

    /// Register a batch under `key` so it can be cancelled by recomputing the
    /// same key.
    pub fn begin(&self, key: BatchKey) -> Batch {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        match self.registry.lock() {
            Ok(mut registry) => registry
                .entry(key.clone())
                .or_default()
                .push((id, token.clone())),
            Err(_) => warn!(batch = %key, "cancellation registry poisoned; batch not cancellable"),
        }
        Batch {
            registry: Arc::clone(&self.registry),
            key,
            id,
            token,
        }
    }

    /// Fetch every id under a fresh batch registered as `key`.
    pub async fn fetch_many<T, F, Fut>(&self, key: BatchKey, ids: &[String], fetch_one: F) -> BatchOutcome<T>
    where
        T: Clone,
        F: Fn(String, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        if ids.is_empty() {
            return BatchOutcome::default();
        }
        let batch = self.begin(key);
        self.run(&batch, ids, fetch_one).await
    }

    /// Fetch every id within an already registered batch.
    ///
    /// Duplicate ids are fetched once and reproduced per occurrence. Ids not
    /// finished when the batch is cancelled report [`CatalogError::Cancelled`].
    pub async fn run<T, F, Fut>(&self, batch: &Batch, ids: &[String], fetch_one: F) -> BatchOutcome<T>
    where
        T: Clone,
        F: Fn(String, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        if ids.is_empty() {
            return BatchOutcome::default();
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();
        debug!(batch = %batch.key, ids = ids.len(), unique = unique.len(), "batch started");

        let semaphore = self.max_concurrent.map(Semaphore::new);
        let tasks = unique.iter().map(|&id| {
            let token = batch.token.child_token();
            let request = fetch_one(id.to_string(), token.clone());
            let semaphore = semaphore.as_ref();
            async move {
                let gated = async {
                    let _permit = match semaphore {
                        Some(s) => Some(s.acquire().await.map_err(|_| CatalogError::Cancelled)?),
                        None => None,
                    };
                    request.await
                };
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(CatalogError::Cancelled),
                    result = gated => result,
                };
                (id, result)
            }
        });
        let completed: HashMap<&str, Result<T, CatalogError>> = join_all(tasks).await.into_iter().collect();

        let mut outcome = BatchOutcome {
            slots: Vec::with_capacity(ids.len()),
            errors: HashMap::new(),
        };
        for id in ids {
            match completed.get(id.as_str()) {
                Some(Ok(value)) => outcome.slots.push(Some(value.clone())),
                Some(Err(err)) => {
                    outcome.slots.push(None);
                    outcome.errors.insert(id.clone(), err.clone());
                }
                None => {
                    outcome.slots.push(None);
                    outcome.errors.insert(id.clone(), CatalogError::Cancelled);
                }
            }
        }

        info!(
            batch = %batch.key,
            ok = outcome.results().count(),
            failed = outcome.errors.len(),
            cancelled = batch.token.is_cancelled(),
            "batch finished"
        );
        outcome
    }

    /// Cancel every in-flight batch registered under `key`. Returns whether
    /// anything was cancelled.
    pub fn cancel(&self, key: &BatchKey) -> bool {
        let Ok(registry) = self.registry.lock() else {
            return false;
        };
        match registry.get(key) {
            Some(entries) => {
                for (_, token) in entries {
                    token.cancel();
                }
                debug!(batch = %key, batches = entries.len(), "batch cancelled");
                !entries.is_empty()
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let Ok(registry) = self.registry.lock() else {
            return;
        };
        for token in registry.values().flatten().map(|(_, t)| t) {
            token.cancel();
        }
        debug!(keys = registry.len(), "all batches cancelled");
    }

    pub fn in_flight(&self) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_ignores_id_order_and_duplicates() {
        let a = BatchKey::new("shows", &["1", "2", "2"], &[("episodes", true)]);
        let b = BatchKey::new("shows", &["2", "1"], &[("episodes", true)]);
        let c = BatchKey::new("shows", &["2", "1"], &[("episodes", false)]);
        let d = BatchKey::new("episodes", &["2", "1"], &[("episodes", true)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 64);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let orchestrator = Orchestrator::new(None);
        let input = ids(&["3", "1", "2"]);
        let outcome = orchestrator
            .fetch_many(BatchKey::new("t", &input, &[]), &input, |id, _| async move {
                // Later ids finish first.
                let delay = 30 - id.parse::<u64>().unwrap() * 10;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, CatalogError>(format!("v{id}"))
            })
            .await;

        assert_eq!(outcome.into_results(), ["v3", "v1", "v2"]);
    }

    #[tokio::test]
    async fn duplicates_fetch_once_and_repeat_in_output() {
        let calls = AtomicUsize::new(0);
        let orchestrator = Orchestrator::new(None);
        let input = ids(&["a", "b", "a", "bad", "a", "bad"]);
        let outcome = orchestrator
            .fetch_many(BatchKey::new("t", &input, &[]), &input, |id, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if id == "bad" {
                        Err(CatalogError::NotFound(id))
                    } else {
                        Ok(id)
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.slots.len(), input.len());
        assert_eq!(outcome.results().cloned().collect::<Vec<_>>(), ["a", "b", "a", "a"]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors["bad"].code(), "not_found");
        for (id, slot) in input.iter().zip(&outcome.slots) {
            assert!(slot.is_some() != outcome.errors.contains_key(id));
        }
    }

    #[tokio::test]
    async fn empty_batch_makes_no_calls() {
        let orchestrator = Orchestrator::new(None);
        let outcome = orchestrator
            .fetch_many(BatchKey::new("t", &[] as &[&str], &[]), &[], |id, _| async move {
                Err::<(), _>(CatalogError::Transport(format!("unexpected fetch of {id}")))
            })
            .await;
        assert!(outcome.slots.is_empty());
        assert!(outcome.is_complete());
        assert_eq!(orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let orchestrator = Orchestrator::new(Some(2));
        let input = ids(&["1", "2", "3", "4", "5"]);
        let outcome = orchestrator
            .fetch_many(BatchKey::new("t", &input, &[]), &input, |id, _| {
                let running = &running;
                let peak = &peak;
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, CatalogError>(id)
                }
            })
            .await;

        assert_eq!(outcome.results().count(), 5);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancelling_by_key_stops_pending_fetches() {
        let orchestrator = Arc::new(Orchestrator::new(None));
        let input = ids(&["A", "B", "C"]);
        let key = BatchKey::new("shows", &input, &[("episodes", true)]);
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            let key = key.clone();
            let input = input.clone();
            tokio::spawn(async move {
                orchestrator
                    .fetch_many(key, &input, |id, _| {
                        let started_tx = started_tx.clone();
                        async move {
                            if id == "A" {
                                return Ok(id);
                            }
                            let _ = started_tx.send(id);
                            std::future::pending::<Result<String, CatalogError>>().await
                        }
                    })
                    .await
            })
        };

        started_rx.recv().await.unwrap();
        started_rx.recv().await.unwrap();
        assert!(orchestrator.cancel(&BatchKey::new("shows", &["C", "B", "A"], &[("episodes", true)])));

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.into_results(), ["A"]);
        assert_eq!(orchestrator.in_flight(), 0);
        assert!(!orchestrator.cancel(&key), "completed batch cancel is a no-op");
    }

    #[tokio::test]
    async fn cancelled_outcome_reports_each_pending_id() {
        let orchestrator = Orchestrator::new(None);
        let input = ids(&["A", "B", "B"]);
        let batch = orchestrator.begin(BatchKey::new("t", &input, &[]));
        batch.token().cancel();

        let outcome = orchestrator
            .run(&batch, &input, |_, _| std::future::pending::<Result<(), CatalogError>>())
            .await;
        assert_eq!(outcome.slots, [None, None, None]);
        assert_eq!(outcome.errors["A"], CatalogError::Cancelled);
        assert_eq!(outcome.errors["B"], CatalogError::Cancelled);
    }

    #[tokio::test]
    async fn cancel_all_reaches_every_batch() {
        let orchestrator = Orchestrator::new(None);
        let first = orchestrator.begin(BatchKey::new("a", &["1"], &[]));
        let second = orchestrator.begin(BatchKey::new("b", &["1"], &[]));
        assert_eq!(orchestrator.in_flight(), 2);

        orchestrator.cancel_all();
        assert!(first.token().is_cancelled());
        assert!(second.token().is_cancelled());

        drop(first);
        drop(second);
        assert_eq!(orchestrator.in_flight(), 0);
    }
}
