//! Total orders for the entity collections.
//!
//! Every comparator falls back to an identifying field, so two distinct
//! entities never compare equal and sorting is deterministic.

use std::cmp::Ordering;

use crate::model::{Actor, Episode, Image, Show, ShowStatus};

/// `(season, episode)` ascending. Season 0 goes after every numbered season
/// unless `specials_in_order` is set.
pub fn episode_cmp(a: &Episode, b: &Episode, specials_in_order: bool) -> Ordering {
    let group = |e: &Episode| u8::from(!specials_in_order && e.is_special());
    group(a)
        .cmp(&group(b))
        .then_with(|| a.season_number().cmp(&b.season_number()))
        .then_with(|| a.episode_number().cmp(&b.episode_number()))
        .then_with(|| a.id().cmp(b.id()))
}

/// Kind precedence (fanart, poster, season, banner, unknown), then rating and
/// rating count descending, then url.
pub fn image_cmp(a: &Image, b: &Image) -> Ordering {
    a.kind()
        .precedence()
        .cmp(&b.kind().precedence())
        .then_with(|| desc_f64(a.rating(), b.rating()))
        .then_with(|| b.rating_count().cmp(&a.rating_count()))
        .then_with(|| a.url().cmp(b.url()))
}

/// `sort_order` ascending, then name, then id.
pub fn actor_cmp(a: &Actor, b: &Actor) -> Ordering {
    a.sort_order()
        .cmp(&b.sort_order())
        .then_with(|| a.name().cmp(b.name()))
        .then_with(|| a.id().cmp(b.id()))
}

/// Shows with a known next episode first (soonest first), then announced-less
/// running shows, unknown, and ended shows last. Ties by name, then id.
pub fn show_cmp(a: &Show, b: &Show) -> Ordering {
    let rank = |s: &Show| match s.status() {
        ShowStatus::Upcoming => 0u8,
        ShowStatus::Tba => 1,
        ShowStatus::Unknown => 2,
        ShowStatus::Ended => 3,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.days_to_next_episode().cmp(&b.days_to_next_episode()))
        .then_with(|| a.name().cmp(b.name()))
        .then_with(|| a.id().cmp(b.id()))
}

/// Descending with missing values last.
fn desc_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
