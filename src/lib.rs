//! factbook: random facts, a search API client and locally persisted
//! favorites.
//!
//! The favorites registry is the stateful core; everything else either feeds
//! it (the API client), observes it (the favorites view), or is the ambient
//! plumbing it is injected with (store adapters, logging, configuration).

pub mod api;
pub mod config;
pub mod fact;
pub mod logger;
pub mod registry;
pub mod store;
pub mod view;

pub use fact::FactRecord;
pub use registry::{FAVORITES_STORAGE_KEY, FavoritesFeed, FavoritesRegistry};
