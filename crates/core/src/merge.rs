//! Merge engine: folds a freshly fetched show into the one held locally.
//!
//! Merge rules:
//! 1. Scalar fields always take the fetched value.
//! 2. Artwork urls (banner, poster, fanart) only change when asked to.
//! 3. Episodes merge by id; `seen` is caller state and is kept. Episodes the
//!    catalog no longer lists are dropped.
//! 4. Images merge by `(kind, url)`; unmatched local images are dropped.
//! 5. Actors are replaced wholesale.
//!
//! The derived episode summary is left alone; callers refresh it explicitly.

use tracing::debug;

use crate::model::{Episode, Show};
use crate::ordering;

/// Which parts of a show a merge may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub episodes: bool,
    pub images: bool,
    pub actors: bool,
    pub replace_artwork: bool,
}

impl MergeOptions {
    pub fn everything() -> Self {
        Self {
            episodes: true,
            images: true,
            actors: true,
            replace_artwork: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub updated_fields: Vec<&'static str>,
}

impl Show {
    /// Merge `fetched` into `self`. Ids must match; a mismatched show is left
    /// untouched and reported as an empty result.
    pub fn merge_from(&mut self, fetched: Show, opts: MergeOptions) -> MergeResult {
        let mut updated_fields = Vec::new();

        if fetched.id != self.id {
            debug!(show_id = %self.id, fetched_id = %fetched.id, "refusing to merge different show");
            return MergeResult { updated_fields };
        }

        macro_rules! merge_field {
            ($field:ident) => {
                if self.$field != fetched.$field {
                    self.$field = fetched.$field.clone();
                    updated_fields.push(stringify!($field));
                }
            };
        }

        merge_field!(name);
        merge_field!(overview);
        merge_field!(premiere_date);
        merge_field!(imdb_id);
        merge_field!(language);
        merge_field!(air_day);
        merge_field!(air_time);
        merge_field!(content_rating);
        merge_field!(network);
        merge_field!(runtime);
        merge_field!(rating);
        merge_field!(rating_count);
        merge_field!(genres);
        merge_field!(actors_names);
        merge_field!(basic_status);

        if opts.replace_artwork {
            merge_field!(banner_url);
            merge_field!(poster_url);
            merge_field!(fanart_url);
        }

        if opts.episodes && merge_episodes(self, fetched.episodes) {
            updated_fields.push("episodes");
        }

        if opts.images {
            let before = self.images.clone();
            let mut merged = Vec::with_capacity(fetched.images.len());
            for img in fetched.images {
                match self.images.iter().position(|i| i.same_identity(&img)) {
                    Some(pos) => {
                        let mut existing = self.images.swap_remove(pos);
                        existing.absorb(img);
                        merged.push(existing);
                    }
                    None if merged.iter().any(|m: &crate::Image| m.same_identity(&img)) => {}
                    None => merged.push(img),
                }
            }
            merged.sort_by(ordering::image_cmp);
            self.images = merged;
            if self.images != before {
                updated_fields.push("images");
            }
        }

        if opts.actors && self.actors != fetched.actors {
            self.set_actors(fetched.actors);
            updated_fields.push("actors");
        }

        if !updated_fields.is_empty() {
            debug!(show_id = %self.id, ?updated_fields, "merged show");
        }

        MergeResult { updated_fields }
    }

    /// Merge a single fetched episode into this show, keeping its `seen` flag.
    /// Returns `false` when the show does not hold an episode with that id.
    pub fn merge_episode(&mut self, fetched: Episode) -> bool {
        let show_id = self.id.clone();
        let Some(existing) = self.episodes.iter_mut().find(|e| e.id() == fetched.id()) else {
            return false;
        };
        existing.absorb(fetched);
        existing.attach_to(&show_id);
        self.episodes.sort_by(|a, b| ordering::episode_cmp(a, b, false));
        true
    }
}

impl Episode {
    /// Standalone episode merge: every remote field replaced, `seen` kept.
    pub fn merge_from(&mut self, fetched: Episode) -> bool {
        if fetched.id() != self.id() {
            return false;
        }
        let changed = {
            let mut candidate = fetched.clone();
            candidate.set_seen(self.seen());
            candidate != *self
        };
        self.absorb(fetched);
        changed
    }
}

fn merge_episodes(show: &mut Show, fetched: Vec<Episode>) -> bool {
    let before = show.episodes.clone();
    let mut local = std::mem::take(&mut show.episodes);
    let mut merged: Vec<Episode> = Vec::with_capacity(fetched.len());

    for mut ep in fetched {
        ep.attach_to(&show.id);
        if let Some(pos) = merged.iter().position(|m| m.id() == ep.id()) {
            merged[pos].absorb(ep);
            continue;
        }
        match local.iter().position(|e| e.id() == ep.id()) {
            Some(pos) => {
                let mut existing = local.swap_remove(pos);
                existing.absorb(ep);
                merged.push(existing);
            }
            None => merged.push(ep),
        }
    }

    merged.sort_by(|a, b| ordering::episode_cmp(a, b, false));
    show.episodes = merged;
    show.episodes != before
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Actor, BasicStatus, Image, ImageKind};

    fn local_show() -> Show {
        Show::new("80379", "Big Bang")
            .with_overview(Some("old".into()))
            .with_artwork(Some("banner-local".into()), Some("poster-local".into()), None)
            .with_episodes(vec![
                Episode::new("1", 1, 1)
                    .with_title(Some("Pilot".into()))
                    .with_seen(true),
                Episode::new("2", 1, 2).with_title(Some("Second".into())),
                Episode::new("gone", 1, 9),
            ])
            .with_images(vec![
                Image::new(ImageKind::Poster, "p1").with_rating(Some(5.0), Some(1)),
                Image::new(ImageKind::Fanart, "old-fanart"),
            ])
            .with_actors(vec![Actor::new("a", "Old Actor", 0)])
    }

    fn fetched_show() -> Show {
        Show::new("80379", "The Big Bang Theory")
            .with_overview(Some("new".into()))
            .with_basic_status(BasicStatus::Continuing)
            .with_artwork(Some("banner-remote".into()), Some("poster-remote".into()), Some("fanart-remote".into()))
            .with_episodes(vec![
                Episode::new("1", 1, 1)
                    .with_title(Some("Pilot (remastered)".into()))
                    .with_aired_date(NaiveDate::from_ymd_opt(2007, 9, 24))
                    .with_overview(Some("fresh".into())),
                Episode::new("2", 1, 2).with_title(Some("Second".into())),
                Episode::new("3", 1, 3).with_title(Some("Third".into())),
            ])
            .with_images(vec![
                Image::new(ImageKind::Poster, "p1").with_rating(Some(8.0), Some(4)),
                Image::new(ImageKind::Banner, "b1"),
            ])
            .with_actors(vec![Actor::new("b", "Jim Parsons", 0)])
    }

    #[test]
    fn merge_keeps_seen_and_replaces_the_rest() {
        let mut show = local_show();
        let result = show.merge_from(fetched_show(), MergeOptions::everything());

        let pilot = show.episode("1").unwrap();
        assert!(pilot.seen());
        assert_eq!(pilot.title(), Some("Pilot (remastered)"));
        assert_eq!(pilot.overview(), Some("fresh"));
        assert_eq!(pilot.aired_date(), NaiveDate::from_ymd_opt(2007, 9, 24));

        let ids: Vec<&str> = show.episodes().iter().map(Episode::id).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(show.episodes().iter().all(|e| show.owns(e)));

        assert_eq!(show.name(), "The Big Bang Theory");
        assert!(result.updated_fields.contains(&"name"));
        assert!(result.updated_fields.contains(&"episodes"));
    }

    #[test]
    fn artwork_untouched_without_replace_flag() {
        let mut show = local_show();
        let opts = MergeOptions {
            replace_artwork: false,
            ..MergeOptions::everything()
        };
        let result = show.merge_from(fetched_show(), opts);

        assert_eq!(show.banner_url(), Some("banner-local"));
        assert_eq!(show.poster_url(), Some("poster-local"));
        assert_eq!(show.fanart_url(), None);
        assert!(!result.updated_fields.contains(&"banner_url"));

        let mut show = local_show();
        show.merge_from(fetched_show(), MergeOptions::everything());
        assert_eq!(show.banner_url(), Some("banner-remote"));
        assert_eq!(show.fanart_url(), Some("fanart-remote"));
    }

    #[test]
    fn images_merge_by_identity() {
        let mut show = local_show();
        show.merge_from(fetched_show(), MergeOptions::everything());

        let urls: Vec<&str> = show.images().iter().map(Image::url).collect();
        assert_eq!(urls, ["p1", "b1"]);
        assert_eq!(show.images()[0].rating(), Some(8.0));
    }

    #[test]
    fn actors_replaced_wholesale() {
        let mut show = local_show();
        show.merge_from(fetched_show(), MergeOptions::everything());
        let names: Vec<&str> = show.actors().iter().map(Actor::name).collect();
        assert_eq!(names, ["Jim Parsons"]);
    }

    #[test]
    fn disabled_aspects_are_left_alone() {
        let mut show = local_show();
        show.merge_from(fetched_show(), MergeOptions::default());

        assert_eq!(show.episodes().len(), 3);
        assert!(show.episode("gone").is_some());
        assert_eq!(show.actors()[0].name(), "Old Actor");
        assert_eq!(show.images().len(), 2);
        assert_eq!(show.overview(), Some("new"));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = local_show();
        once.merge_from(fetched_show(), MergeOptions::everything());
        let mut twice = once.clone();
        let result = twice.merge_from(fetched_show(), MergeOptions::everything());

        assert_eq!(once, twice);
        assert!(result.updated_fields.is_empty());
    }

    #[test]
    fn blank_text_and_nan_rating_settle_after_one_merge() {
        let odd = || {
            Show::new("80379", "The Big Bang Theory")
                .with_overview(Some(String::new()))
                .with_rating(Some(f64::NAN), Some(3))
                .with_episodes(vec![
                    Episode::new("1", 1, 1)
                        .with_title(Some(String::new()))
                        .with_rating(Some(f64::INFINITY), None),
                ])
        };
        let fetched = odd();
        assert_eq!(fetched.overview(), None);
        assert_eq!(fetched.rating(), None);
        assert_eq!(fetched.episodes()[0].title(), None);

        let mut show = local_show();
        show.merge_from(odd(), MergeOptions::everything());
        let result = show.merge_from(odd(), MergeOptions::everything());
        assert!(result.updated_fields.is_empty());

        let mut ep = odd().episodes()[0].clone();
        assert!(!ep.merge_from(odd().episodes()[0].clone()));
    }

    #[test]
    fn mismatched_show_is_ignored() {
        let mut show = local_show();
        let before = show.clone();
        let result = show.merge_from(Show::new("other", "Other"), MergeOptions::everything());
        assert_eq!(show, before);
        assert!(result.updated_fields.is_empty());
    }

    #[test]
    fn single_episode_merge() {
        let mut show = local_show();
        let fetched = Episode::new("1", 1, 1).with_title(Some("Renamed".into()));
        assert!(show.merge_episode(fetched));
        let pilot = show.episode("1").unwrap();
        assert!(pilot.seen());
        assert_eq!(pilot.title(), Some("Renamed"));
        assert_eq!(pilot.show_id(), Some("80379"));

        assert!(!show.merge_episode(Episode::new("404", 1, 1)));
    }

    #[test]
    fn standalone_episode_merge_reports_change() {
        let mut ep = Episode::new("9", 2, 1).with_seen(true);
        assert!(ep.merge_from(Episode::new("9", 2, 1).with_title(Some("t".into()))));
        assert!(ep.seen());
        assert!(!ep.merge_from(Episode::new("9", 2, 1).with_title(Some("t".into()))));
        assert!(!ep.merge_from(Episode::new("other", 2, 1)));
    }
}
