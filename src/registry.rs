//! Favorites registry: the persisted, deduplicated, newest-first list of
//! favorited facts and its live feed.
//!
//! DESIGN
//! ======
//! One mutex guards both the list and the subscriber senders. `add` and
//! `remove` hold it across check → write → commit → publish, so every feed
//! sees mutations in the order they were applied. Feeds are unbounded
//! channels: publishing never blocks and never drops an update, and a feed
//! whose receiver is gone is pruned on the next publish.
//!
//! ERROR HANDLING
//! ==============
//! Neither malformed persisted data nor a failed write reaches the caller.
//! Both are reported to the injected [`Logger`]. A failed write discards the
//! mutation: the list is committed and published only after the store
//! accepted it. Callers cannot tell a lost write from a successful one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::fact::{FactRecord, format_timestamp, sort_newest_first};
use crate::logger::Logger;
use crate::store::{KeyValueStore, StoreError};

/// Key the favorites blob is stored under.
pub const FAVORITES_STORAGE_KEY: &str = "favorites";

const LOG_CONTEXT: &str = "FavoritesService";

/// Shared immutable view of the list as published to feeds.
pub type FactList = Arc<[FactRecord]>;

/// Source of the instant stamped onto newly favorited facts.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Failure to persist the list.
#[derive(Debug, thiserror::Error)]
enum PersistError {
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct Inner {
    favorites: FactList,
    feeds: Vec<UnboundedSender<FactList>>,
}

/// Process-wide favorites state. Construct once and share via `Arc`.
pub struct FavoritesRegistry {
    store: Arc<dyn KeyValueStore>,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl FavoritesRegistry {
    /// Build a registry and load whatever the store holds.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, logger: Arc<dyn Logger>) -> Self {
        Self::with_clock(store, logger, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(store: Arc<dyn KeyValueStore>, logger: Arc<dyn Logger>, clock: Arc<dyn Clock>) -> Self {
        let registry = Self {
            store,
            logger,
            clock,
            inner: Mutex::new(Inner { favorites: Arc::from(Vec::new()), feeds: Vec::new() }),
        };
        if let Some(loaded) = registry.load() {
            registry.lock().favorites = loaded.into();
        }
        registry
    }

    /// Re-read the store. A missing blob leaves the current list alone;
    /// anything else (including a malformed blob, which yields an empty list)
    /// replaces it and is published.
    pub fn reload(&self) {
        let Some(loaded) = self.load() else {
            return;
        };
        let mut inner = self.lock();
        inner.favorites = loaded.into();
        Self::publish(&mut inner);
    }

    /// Live feed of the list. The first item is the current list; each later
    /// item follows one committed mutation. Dropping the feed unsubscribes.
    #[must_use]
    pub fn get_all(&self) -> FavoritesFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(inner.favorites.clone());
        inner.feeds.push(tx);
        FavoritesFeed { rx }
    }

    /// Favorite `fact`, stamping `created_at` with the current instant.
    /// Already-favorited ids are left untouched and nothing is written.
    pub fn add(&self, fact: &FactRecord) {
        let mut inner = self.lock();
        if inner.favorites.iter().any(|f| f.id == fact.id) {
            return;
        }
        let stamped = FactRecord { created_at: format_timestamp(self.clock.now()), ..fact.clone() };
        let mut next = inner.favorites.to_vec();
        next.push(stamped);
        debug!(id = %fact.id, count = next.len(), "adding favorite");
        self.save(&mut inner, next);
    }

    /// Unfavorite by `fact.id`. An unknown id still rewrites and republishes
    /// the unchanged list.
    pub fn remove(&self, fact: &FactRecord) {
        self.remove_by_id(&fact.id);
    }

    pub fn remove_by_id(&self, id: &str) {
        let mut inner = self.lock();
        let next: Vec<FactRecord> = inner.favorites.iter().filter(|f| f.id != id).cloned().collect();
        debug!(%id, removed = inner.favorites.len() - next.len(), "removing favorite");
        self.save(&mut inner, next);
    }

    #[must_use]
    pub fn is_favorite(&self, id: &str) -> bool {
        self.lock().favorites.iter().any(|f| f.id == id)
    }

    /// Current list, newest first.
    #[must_use]
    pub fn snapshot(&self) -> FactList {
        self.lock().favorites.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().favorites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().favorites.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` when nothing (or an empty string) is stored; an empty list when
    /// the blob is malformed.
    fn load(&self) -> Option<Vec<FactRecord>> {
        let raw = self.store.read(FAVORITES_STORAGE_KEY).filter(|raw| !raw.is_empty())?;
        match serde_json::from_str::<Vec<FactRecord>>(&raw) {
            Ok(mut favorites) => {
                sort_newest_first(&mut favorites);
                debug!(count = favorites.len(), "loaded stored favorites");
                Some(favorites)
            }
            Err(e) => {
                self.logger.error("Error parsing stored favorites", &e, LOG_CONTEXT);
                Some(Vec::new())
            }
        }
    }

    /// Sort, write, then commit and publish. A failed write is logged and the
    /// committed list stays as it was.
    fn save(&self, inner: &mut Inner, mut next: Vec<FactRecord>) {
        sort_newest_first(&mut next);
        if let Err(e) = self.persist(&next) {
            self.logger.error("Error saving favorites", &e, LOG_CONTEXT);
            return;
        }
        inner.favorites = next.into();
        Self::publish(inner);
    }

    fn persist(&self, favorites: &[FactRecord]) -> Result<(), PersistError> {
        let raw = serde_json::to_string(favorites)?;
        self.store.write(FAVORITES_STORAGE_KEY, &raw)?;
        Ok(())
    }

    fn publish(inner: &mut Inner) {
        let list = inner.favorites.clone();
        inner.feeds.retain(|tx| tx.send(list.clone()).is_ok());
    }
}

/// Receiving end of [`FavoritesRegistry::get_all`].
#[derive(Debug)]
pub struct FavoritesFeed {
    rx: UnboundedReceiver<FactList>,
}

impl FavoritesFeed {
    /// Wait for the next list. `None` once the registry is gone.
    pub async fn recv(&mut self) -> Option<FactList> {
        self.rx.recv().await
    }

    /// Next pending list without waiting.
    pub fn try_recv(&mut self) -> Option<FactList> {
        self.rx.try_recv().ok()
    }

    /// Drain pending lists and return the most recent one, if any.
    pub fn latest(&mut self) -> Option<FactList> {
        let mut last = None;
        while let Ok(list) = self.rx.try_recv() {
            last = Some(list);
        }
        last
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
