//! Entity model for the show catalog: shows and the episodes, images and
//! actors they own, plus the orderings and merge rules the sync engine uses.

pub mod error;
pub mod merge;
pub mod model;
pub mod ordering;

pub use error::CatalogError;
pub use merge::MergeOptions;
pub use model::{
    Actor, BasicStatus, Episode, EpisodeSummary, Image, ImageKind, Show, ShowStatus,
};
