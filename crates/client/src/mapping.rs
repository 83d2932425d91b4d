//! Catalog payload mapping.
//!
//! Payloads arrive as loosely typed dictionaries: scalars may be strings or
//! numbers, a single-element list may be a bare object, lists of names are
//! piped (`|A|B|`), and artwork paths are relative to the banner base.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use showsync_core::{Actor, BasicStatus, CatalogError, Episode, Image, ImageKind, Show};
use tracing::warn;

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// Ids the catalog reports as changed since a timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatedIds {
    pub shows: HashSet<String>,
    pub episodes: HashSet<String>,
    pub server_time: Option<i64>,
}

/// Basic show records from a name search. Entries without an id are skipped.
pub fn parse_search(payload: &Value, artwork_base: &str) -> Vec<Show> {
    list(payload.pointer("/Data/Series"))
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match parse_show_record(entry, artwork_base) {
            Ok(show) => Some(show),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping malformed search result");
                None
            }
        })
        .collect()
}

/// A show payload, with its episodes when the payload carries them.
pub fn parse_show(payload: &Value, artwork_base: &str) -> Result<Show, CatalogError> {
    let series = first(payload.pointer("/Data/Series"))
        .ok_or_else(|| CatalogError::missing("Data.Series"))?;
    let show = parse_show_record(series, artwork_base)?;

    let episodes = list(payload.pointer("/Data/Episode"))
        .into_iter()
        .enumerate()
        .map(|(idx, e)| parse_episode_record(e, artwork_base).map_err(|err| err.within(&format!("Episode[{idx}]"))))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(show.with_episodes(episodes))
}

pub fn parse_episode(payload: &Value, artwork_base: &str) -> Result<Episode, CatalogError> {
    let record = first(payload.pointer("/Data/Episode"))
        .ok_or_else(|| CatalogError::missing("Data.Episode"))?;
    parse_episode_record(record, artwork_base)
}

pub fn parse_images(payload: &Value, artwork_base: &str) -> Result<Vec<Image>, CatalogError> {
    list(payload.pointer("/Banners/Banner"))
        .into_iter()
        .enumerate()
        .map(|(idx, b)| parse_image_record(b, artwork_base).map_err(|e| e.within(&format!("Banner[{idx}]"))))
        .collect()
}

pub fn parse_actors(payload: &Value, artwork_base: &str) -> Result<Vec<Actor>, CatalogError> {
    list(payload.pointer("/Actors/Actor"))
        .into_iter()
        .enumerate()
        .map(|(idx, a)| parse_actor_record(a, artwork_base).map_err(|e| e.within(&format!("Actor[{idx}]"))))
        .collect()
}

pub fn parse_updates(payload: &Value) -> Result<UpdatedIds, CatalogError> {
    let ids = |ptr: &str| -> Result<HashSet<String>, CatalogError> {
        list(payload.pointer(ptr))
            .into_iter()
            .map(|v| scalar(v, ptr).and_then(|s| s.ok_or_else(|| CatalogError::missing(ptr))))
            .collect()
    };
    Ok(UpdatedIds {
        shows: ids("/Items/Series")?,
        episodes: ids("/Items/Episode")?,
        server_time: integer(payload.pointer("/Items/Time"), "Items.Time")?,
    })
}

pub fn parse_server_time(payload: &Value) -> Result<i64, CatalogError> {
    integer(payload.pointer("/Items/Time"), "Items.Time")?
        .ok_or_else(|| CatalogError::missing("Items.Time"))
}

fn parse_show_record(v: &Value, artwork_base: &str) -> Result<Show, CatalogError> {
    let status = text(v, "Status")?.unwrap_or_default();
    Ok(Show::new(required(v, "id")?, text(v, "SeriesName")?.unwrap_or_default())
        .with_overview(text(v, "Overview")?)
        .with_premiere_date(date(v, "FirstAired")?)
        .with_imdb_id(text(v, "IMDB_ID")?)
        .with_language(text(v, "Language")?.or(text(v, "language")?))
        .with_airs(text(v, "Airs_DayOfWeek")?, text(v, "Airs_Time")?)
        .with_content_rating(text(v, "ContentRating")?)
        .with_network(text(v, "Network")?)
        .with_runtime(unsigned(v.get("Runtime"), "Runtime")?)
        .with_rating(float(v.get("Rating"), "Rating")?, unsigned(v.get("RatingCount"), "RatingCount")?)
        .with_genres(piped(v, "Genre")?)
        .with_actors_names(piped(v, "Actors")?)
        .with_basic_status(BasicStatus::parse(&status).unwrap_or_default())
        .with_artwork(
            artwork(v, "banner", artwork_base)?,
            artwork(v, "poster", artwork_base)?,
            artwork(v, "fanart", artwork_base)?,
        ))
}

fn parse_episode_record(v: &Value, artwork_base: &str) -> Result<Episode, CatalogError> {
    let season = unsigned(v.get("SeasonNumber"), "SeasonNumber")?
        .ok_or_else(|| CatalogError::missing("SeasonNumber"))?;
    let number = unsigned(v.get("EpisodeNumber"), "EpisodeNumber")?
        .ok_or_else(|| CatalogError::missing("EpisodeNumber"))?;

    Ok(Episode::new(required(v, "id")?, season, number)
        .with_title(text(v, "EpisodeName")?)
        .with_aired_date(date(v, "FirstAired")?)
        .with_rating(float(v.get("Rating"), "Rating")?, unsigned(v.get("RatingCount"), "RatingCount")?)
        .with_overview(text(v, "Overview")?)
        .with_artwork_url(artwork(v, "filename", artwork_base)?)
        .with_imdb_id(text(v, "IMDB_ID")?)
        .with_language(text(v, "Language")?)
        .with_show_id(text(v, "seriesid")?)
        .with_credits(piped(v, "Writer")?, piped(v, "Director")?, piped(v, "GuestStars")?))
}

fn parse_image_record(v: &Value, artwork_base: &str) -> Result<Image, CatalogError> {
    let path = required(v, "BannerPath")?;
    let kind = text(v, "BannerType")?
        .map(|t| ImageKind::parse(&t))
        .unwrap_or(ImageKind::Unknown);
    let thumbnail = text(v, "ThumbnailPath")?
        .or_else(|| Some(format!("_cache/{path}")))
        .map(|p| join_artwork(artwork_base, &p));

    Ok(Image::new(kind, join_artwork(artwork_base, &path))
        .with_thumbnail_url(thumbnail)
        .with_rating(float(v.get("Rating"), "Rating")?, unsigned(v.get("RatingCount"), "RatingCount")?))
}

fn parse_actor_record(v: &Value, artwork_base: &str) -> Result<Actor, CatalogError> {
    let sort_order = integer(v.get("SortOrder"), "SortOrder")?.unwrap_or_default();
    let sort_order = i32::try_from(sort_order)
        .map_err(|_| CatalogError::mismatch("SortOrder", "integer", sort_order.to_string()))?;

    Ok(Actor::new(required(v, "id")?, text(v, "Name")?.unwrap_or_default(), sort_order)
        .with_role(text(v, "Role")?)
        .with_artwork_url(artwork(v, "Image", artwork_base)?))
}

/// Absent, null, a list, or a single bare item.
fn list(v: Option<&Value>) -> Vec<&Value> {
    match v {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

fn first(v: Option<&Value>) -> Option<&Value> {
    list(v).into_iter().next()
}

fn scalar(v: &Value, field: &str) -> Result<Option<String>, CatalogError> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| unescape_html(s)))
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(_) => Err(CatalogError::mismatch(field, "string", "bool")),
        Value::Array(_) => Err(CatalogError::mismatch(field, "string", "list")),
        Value::Object(_) => Err(CatalogError::mismatch(field, "string", "record")),
    }
}

fn text(v: &Value, field: &str) -> Result<Option<String>, CatalogError> {
    v.get(field).map_or(Ok(None), |x| scalar(x, field))
}

fn required(v: &Value, field: &str) -> Result<String, CatalogError> {
    text(v, field)?.ok_or_else(|| CatalogError::missing(field))
}

fn integer(v: Option<&Value>, field: &str) -> Result<Option<i64>, CatalogError> {
    let Some(raw) = v.map(|x| scalar(x, field)).transpose()?.flatten() else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(n) => Ok(Some(n)),
        Err(_) => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Some(f as i64)),
            _ => Err(CatalogError::mismatch(field, "integer", raw)),
        },
    }
}

fn unsigned(v: Option<&Value>, field: &str) -> Result<Option<u32>, CatalogError> {
    integer(v, field)?
        .map(|n| u32::try_from(n).map_err(|_| CatalogError::mismatch(field, "unsigned integer", n.to_string())))
        .transpose()
}

fn float(v: Option<&Value>, field: &str) -> Result<Option<f64>, CatalogError> {
    let Some(raw) = v.map(|x| scalar(x, field)).transpose()?.flatten() else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(CatalogError::mismatch(field, "number", raw)),
    }
}

/// Unparsable dates are treated as unknown, as the catalog uses placeholders
/// such as `0000-00-00`.
fn date(v: &Value, field: &str) -> Result<Option<NaiveDate>, CatalogError> {
    Ok(text(v, field)?.and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()))
}

fn piped(v: &Value, field: &str) -> Result<Vec<String>, CatalogError> {
    Ok(text(v, field)?
        .map(|raw| {
            raw.split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

fn artwork(v: &Value, field: &str, base: &str) -> Result<Option<String>, CatalogError> {
    Ok(text(v, field)?.map(|p| join_artwork(base, &p)))
}

fn join_artwork(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let numeric = NUMERIC_ENTITY_RE.replace_all(s, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const BASE: &str = "https://thetvdb.com/banners/";

    #[test]
    fn parse_full_show_payload() {
        let payload = json!({
            "Data": {
                "Series": {
                    "id": "80379",
                    "SeriesName": "The Big Bang Theory",
                    "Overview": "Leonard &amp; Sheldon&#39;s life",
                    "FirstAired": "2007-09-24",
                    "IMDB_ID": "tt0898266",
                    "Language": "en",
                    "Airs_DayOfWeek": "Thursday",
                    "Airs_Time": "8:00 PM",
                    "ContentRating": "TV-PG",
                    "Network": "CBS",
                    "Runtime": "30",
                    "Rating": "8.9",
                    "RatingCount": 1200,
                    "Genre": "|Comedy|",
                    "Actors": "|Jim Parsons|Kaley Cuoco|",
                    "Status": "Continuing",
                    "banner": "graphical/80379-g.jpg",
                    "poster": "posters/80379-1.jpg",
                    "fanart": ""
                },
                "Episode": [
                    {
                        "id": "332484", "SeasonNumber": "1", "EpisodeNumber": "1",
                        "EpisodeName": "Pilot", "FirstAired": "2007-09-24",
                        "Writer": "|Chuck Lorre|Bill Prady|", "Director": "James Burrows",
                        "filename": "episodes/80379/332484.jpg", "seriesid": "80379"
                    },
                    { "id": "s1", "SeasonNumber": 0, "EpisodeNumber": 1, "FirstAired": "0000-00-00" }
                ]
            }
        });

        let show = parse_show(&payload, BASE).unwrap();
        assert_eq!(show.id(), "80379");
        assert_eq!(show.overview(), Some("Leonard & Sheldon's life"));
        assert_eq!(show.premiere_date(), NaiveDate::from_ymd_opt(2007, 9, 24));
        assert_eq!(show.runtime(), Some(30));
        assert_eq!(show.rating(), Some(8.9));
        assert_eq!(show.rating_count(), Some(1200));
        assert_eq!(show.genres(), ["Comedy"]);
        assert_eq!(show.actors_names(), ["Jim Parsons", "Kaley Cuoco"]);
        assert_eq!(show.basic_status(), BasicStatus::Continuing);
        assert_eq!(show.banner_url(), Some("https://thetvdb.com/banners/graphical/80379-g.jpg"));
        assert_eq!(show.fanart_url(), None);

        assert_eq!(show.episodes().len(), 2);
        let pilot = show.episode("332484").unwrap();
        assert_eq!(pilot.writers(), ["Chuck Lorre", "Bill Prady"]);
        assert_eq!(pilot.directors(), ["James Burrows"]);
        assert_eq!(pilot.artwork_url(), Some("https://thetvdb.com/banners/episodes/80379/332484.jpg"));
        assert!(show.owns(pilot));
        assert_eq!(show.episode("s1").unwrap().aired_date(), None);
    }

    #[test]
    fn show_without_series_is_missing_field() {
        let err = parse_show(&json!({ "Data": {} }), BASE).unwrap_err();
        assert_eq!(err, CatalogError::missing("Data.Series"));
    }

    #[test]
    fn bad_episode_names_its_position() {
        let payload = json!({
            "Data": {
                "Series": { "id": "1" },
                "Episode": [{ "id": "a", "SeasonNumber": "1", "EpisodeNumber": "one" }]
            }
        });
        let err = parse_show(&payload, BASE).unwrap_err();
        assert_eq!(err, CatalogError::mismatch("Episode[0].EpisodeNumber", "integer", "one"));
    }

    #[test]
    fn non_finite_rating_is_rejected() {
        for raw in ["NaN", "inf", "-infinity"] {
            let payload = json!({ "Data": { "Episode": { "id": "7", "SeasonNumber": "1", "EpisodeNumber": "2", "Rating": raw } } });
            let err = parse_episode(&payload, BASE).unwrap_err();
            assert_eq!(err, CatalogError::mismatch("Rating", "number", raw));
        }

        let payload = json!({ "Data": { "Episode": { "id": "7", "SeasonNumber": "NaN", "EpisodeNumber": "2" } } });
        let err = parse_episode(&payload, BASE).unwrap_err();
        assert_eq!(err, CatalogError::mismatch("SeasonNumber", "integer", "NaN"));
    }

    #[test]
    fn search_accepts_single_or_many() {
        let one = json!({ "Data": { "Series": { "id": "1", "SeriesName": "Lost" } } });
        assert_eq!(parse_search(&one, BASE).len(), 1);

        let many = json!({ "Data": { "Series": [
            { "id": "1", "SeriesName": "Lost" },
            { "SeriesName": "no id" },
            { "id": "2", "SeriesName": "Lost (2)" }
        ] } });
        let ids: Vec<String> = parse_search(&many, BASE).iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, ["1", "2"]);

        assert!(parse_search(&json!({ "Data": {} }), BASE).is_empty());
    }

    #[test]
    fn images_and_actors() {
        let banners = json!({ "Banners": { "Banner": [
            { "BannerPath": "fanart/original/1.jpg", "BannerType": "fanart", "Rating": "9.1", "RatingCount": "7" },
            { "BannerPath": "graphical/1.jpg", "BannerType": "series", "ThumbnailPath": "_cache/graphical/1.jpg" }
        ] } });
        let images = parse_images(&banners, BASE).unwrap();
        assert_eq!(images[0].kind(), ImageKind::Fanart);
        assert_eq!(images[0].thumbnail_url(), Some("https://thetvdb.com/banners/_cache/fanart/original/1.jpg"));
        assert_eq!(images[1].kind(), ImageKind::Banner);

        let actors = json!({ "Actors": { "Actor": { "id": "77", "Name": "Jim Parsons", "Role": "Sheldon", "SortOrder": "0", "Image": "actors/77.jpg" } } });
        let actors = parse_actors(&actors, BASE).unwrap();
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].artwork_url(), Some("https://thetvdb.com/banners/actors/77.jpg"));
    }

    #[test]
    fn updates_list() {
        let payload = json!({ "Items": { "Time": "1700000100", "Series": ["1", 2], "Episode": "9" } });
        let updates = parse_updates(&payload).unwrap();
        assert!(updates.shows.contains("1"));
        assert!(updates.shows.contains("2"));
        assert!(updates.episodes.contains("9"));
        assert_eq!(updates.server_time, Some(1700000100));
        assert_eq!(parse_server_time(&payload).unwrap(), 1700000100);
    }

    #[test]
    fn numeric_entities_unescape() {
        assert_eq!(unescape_html("caf&#233; &#x41;&amp;B"), "café A&B");
        assert_eq!(unescape_html("&#99999999;"), "&#99999999;");
    }
}
