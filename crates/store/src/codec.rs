//! Flat record codec for the persisted library.
//!
//! Each entity has a serde record with a fixed key set. Optional text is
//! written as `""` and read back as absent, optional numbers as `null`.
//! Fields are read into a [`Slot`], so a wrong type never aborts the whole
//! record inside serde; it is reported with its key when the record is
//! turned into an entity.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use showsync_core::{Actor, BasicStatus, CatalogError, Episode, Image, ImageKind, Show};

/// Two-way mapping between an entity and its persisted record.
pub trait Codec: Sized {
    type Record: Serialize + DeserializeOwned;

    fn to_record(&self) -> Self::Record;
    fn from_record(record: Self::Record) -> Result<Self, CatalogError>;
}

/// Outcome of decoding a list of records: what decoded, and why the rest
/// did not (by position in the input).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeReport<T> {
    pub entities: Vec<T>,
    pub errors: Vec<(usize, CatalogError)>,
}

impl<T> Default for DecodeReport<T> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> DecodeReport<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decode every record independently; one bad record never hides the others.
pub fn decode_all<T: Codec>(values: Vec<Value>) -> DecodeReport<T> {
    let mut report = DecodeReport::default();
    for (idx, value) in values.into_iter().enumerate() {
        let decoded = match value {
            Value::Object(_) => serde_json::from_value::<T::Record>(value)
                .map_err(|e| CatalogError::mismatch(format!("[{idx}]"), "record", e.to_string()))
                .and_then(T::from_record),
            other => Err(CatalogError::mismatch(format!("[{idx}]"), "record", kind_of(&other))),
        };
        match decoded {
            Ok(entity) => report.entities.push(entity),
            Err(e) => report.errors.push((idx, e)),
        }
    }
    report
}

/// A record field as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot<T> {
    /// Missing, `null` or `""`.
    #[default]
    Absent,
    Set(T),
    /// Present with another JSON type, named here.
    Wrong(&'static str),
}

impl<T> From<Option<T>> for Slot<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Slot::Absent, Slot::Set)
    }
}

impl<T: Expected> Slot<T> {
    pub fn optional(self, field: &str) -> Result<Option<T>, CatalogError> {
        match self {
            Slot::Absent => Ok(None),
            Slot::Set(value) => Ok(Some(value)),
            Slot::Wrong(found) => Err(CatalogError::mismatch(field, T::KIND, found)),
        }
    }

    pub fn required(self, field: &str) -> Result<T, CatalogError> {
        self.optional(field)?.ok_or_else(|| CatalogError::missing(field))
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Slot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Slot::Absent,
            Value::String(s) if s.is_empty() => Slot::Absent,
            value => {
                let found = kind_of(&value);
                serde_json::from_value(value).map_or(Slot::Wrong(found), Slot::Set)
            }
        })
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Set(value) => value.serialize(serializer),
            Slot::Absent | Slot::Wrong(_) => serializer.serialize_none(),
        }
    }
}

/// Text-like fields are written as `""` when absent.
mod blank {
    use serde::{Serialize, Serializer};

    use super::Slot;

    pub fn serialize<T: Serialize, S: Serializer>(slot: &Slot<T>, serializer: S) -> Result<S::Ok, S::Error> {
        match slot {
            Slot::Set(value) => value.serialize(serializer),
            Slot::Absent | Slot::Wrong(_) => serializer.serialize_str(""),
        }
    }
}

/// Name of the JSON shape a field expects, for type mismatch errors.
pub trait Expected {
    const KIND: &'static str;
}

macro_rules! expected {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(impl Expected for $ty {
            const KIND: &'static str = $kind;
        })*
    };
}

expected! {
    String => "string",
    NaiveDate => "ISO 8601 date",
    u32 => "unsigned integer",
    i32 => "integer",
    f64 => "number",
    bool => "bool",
    Vec<String> => "list of strings",
    Vec<EpisodeRecord> => "list of records",
    Vec<ImageRecord> => "list of records",
    Vec<ActorRecord> => "list of records",
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShowRecord {
    #[serde(rename = "showID", serialize_with = "blank::serialize")]
    pub show_id: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub name: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub overview: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub premiere_date: Slot<NaiveDate>,
    #[serde(rename = "imdbID", serialize_with = "blank::serialize")]
    pub imdb_id: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub language: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub air_day: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub air_time: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub content_rating: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub network: Slot<String>,
    pub runtime: Slot<u32>,
    pub rating: Slot<f64>,
    pub rating_count: Slot<u32>,
    pub genres: Slot<Vec<String>>,
    pub actors_names: Slot<Vec<String>>,
    #[serde(serialize_with = "blank::serialize")]
    pub basic_status: Slot<String>,
    #[serde(rename = "bannerURL", serialize_with = "blank::serialize")]
    pub banner_url: Slot<String>,
    #[serde(rename = "posterURL", serialize_with = "blank::serialize")]
    pub poster_url: Slot<String>,
    #[serde(rename = "fanartURL", serialize_with = "blank::serialize")]
    pub fanart_url: Slot<String>,
    pub episodes: Slot<Vec<EpisodeRecord>>,
    pub images: Slot<Vec<ImageRecord>>,
    pub actors: Slot<Vec<ActorRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EpisodeRecord {
    #[serde(rename = "episodeID", serialize_with = "blank::serialize")]
    pub episode_id: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub title: Slot<String>,
    pub season_number: Slot<u32>,
    pub episode_number: Slot<u32>,
    #[serde(serialize_with = "blank::serialize")]
    pub aired_date: Slot<NaiveDate>,
    pub rating: Slot<f64>,
    pub rating_count: Slot<u32>,
    #[serde(serialize_with = "blank::serialize")]
    pub overview: Slot<String>,
    #[serde(rename = "imageURL", serialize_with = "blank::serialize")]
    pub image_url: Slot<String>,
    #[serde(rename = "imdbID", serialize_with = "blank::serialize")]
    pub imdb_id: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub language: Slot<String>,
    #[serde(rename = "showID", serialize_with = "blank::serialize")]
    pub show_id: Slot<String>,
    pub writers: Slot<Vec<String>>,
    pub directors: Slot<Vec<String>>,
    pub guest_stars: Slot<Vec<String>>,
    pub seen: Slot<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageRecord {
    #[serde(rename = "type", serialize_with = "blank::serialize")]
    pub kind: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub url: Slot<String>,
    #[serde(rename = "thumbnailURL", serialize_with = "blank::serialize")]
    pub thumbnail_url: Slot<String>,
    pub rating: Slot<f64>,
    pub rating_count: Slot<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActorRecord {
    #[serde(rename = "actorID", serialize_with = "blank::serialize")]
    pub actor_id: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub name: Slot<String>,
    #[serde(serialize_with = "blank::serialize")]
    pub role: Slot<String>,
    #[serde(rename = "artworkURL", serialize_with = "blank::serialize")]
    pub artwork_url: Slot<String>,
    pub sort_order: Slot<i32>,
}

impl Codec for Show {
    type Record = ShowRecord;

    fn to_record(&self) -> ShowRecord {
        ShowRecord {
            show_id: text(Some(self.id())),
            name: text(Some(self.name())),
            overview: text(self.overview()),
            premiere_date: self.premiere_date().into(),
            imdb_id: text(self.imdb_id()),
            language: text(self.language()),
            air_day: text(self.air_day()),
            air_time: text(self.air_time()),
            content_rating: text(self.content_rating()),
            network: text(self.network()),
            runtime: self.runtime().into(),
            rating: self.rating().into(),
            rating_count: self.rating_count().into(),
            genres: Slot::Set(self.genres().to_vec()),
            actors_names: Slot::Set(self.actors_names().to_vec()),
            basic_status: text(Some(self.basic_status().as_str())),
            banner_url: text(self.banner_url()),
            poster_url: text(self.poster_url()),
            fanart_url: text(self.fanart_url()),
            episodes: Slot::Set(self.episodes().iter().map(Codec::to_record).collect()),
            images: Slot::Set(self.images().iter().map(Codec::to_record).collect()),
            actors: Slot::Set(self.actors().iter().map(Codec::to_record).collect()),
        }
    }

    fn from_record(r: ShowRecord) -> Result<Self, CatalogError> {
        let status_raw = r.basic_status.optional("basicStatus")?.unwrap_or_default();
        let basic_status = BasicStatus::parse(&status_raw)
            .ok_or_else(|| CatalogError::mismatch("basicStatus", "show status", status_raw.clone()))?;

        Ok(Show::new(r.show_id.required("showID")?, r.name.optional("name")?.unwrap_or_default())
            .with_overview(r.overview.optional("overview")?)
            .with_premiere_date(r.premiere_date.optional("premiereDate")?)
            .with_imdb_id(r.imdb_id.optional("imdbID")?)
            .with_language(r.language.optional("language")?)
            .with_airs(r.air_day.optional("airDay")?, r.air_time.optional("airTime")?)
            .with_content_rating(r.content_rating.optional("contentRating")?)
            .with_network(r.network.optional("network")?)
            .with_runtime(r.runtime.optional("runtime")?)
            .with_rating(r.rating.optional("rating")?, r.rating_count.optional("ratingCount")?)
            .with_genres(r.genres.optional("genres")?.unwrap_or_default())
            .with_actors_names(r.actors_names.optional("actorsNames")?.unwrap_or_default())
            .with_basic_status(basic_status)
            .with_artwork(
                r.banner_url.optional("bannerURL")?,
                r.poster_url.optional("posterURL")?,
                r.fanart_url.optional("fanartURL")?,
            )
            .with_episodes(nested(r.episodes, "episodes")?)
            .with_images(nested(r.images, "images")?)
            .with_actors(nested(r.actors, "actors")?))
    }
}

impl Codec for Episode {
    type Record = EpisodeRecord;

    fn to_record(&self) -> EpisodeRecord {
        EpisodeRecord {
            episode_id: text(Some(self.id())),
            title: text(self.title()),
            season_number: Slot::Set(self.season_number()),
            episode_number: Slot::Set(self.episode_number()),
            aired_date: self.aired_date().into(),
            rating: self.rating().into(),
            rating_count: self.rating_count().into(),
            overview: text(self.overview()),
            image_url: text(self.artwork_url()),
            imdb_id: text(self.imdb_id()),
            language: text(self.language()),
            show_id: text(self.show_id()),
            writers: Slot::Set(self.writers().to_vec()),
            directors: Slot::Set(self.directors().to_vec()),
            guest_stars: Slot::Set(self.guest_stars().to_vec()),
            seen: Slot::Set(self.seen()),
        }
    }

    fn from_record(r: EpisodeRecord) -> Result<Self, CatalogError> {
        Ok(Episode::new(
            r.episode_id.required("episodeID")?,
            r.season_number.required("seasonNumber")?,
            r.episode_number.required("episodeNumber")?,
        )
        .with_title(r.title.optional("title")?)
        .with_aired_date(r.aired_date.optional("airedDate")?)
        .with_rating(r.rating.optional("rating")?, r.rating_count.optional("ratingCount")?)
        .with_overview(r.overview.optional("overview")?)
        .with_artwork_url(r.image_url.optional("imageURL")?)
        .with_imdb_id(r.imdb_id.optional("imdbID")?)
        .with_language(r.language.optional("language")?)
        .with_show_id(r.show_id.optional("showID")?)
        .with_credits(
            r.writers.optional("writers")?.unwrap_or_default(),
            r.directors.optional("directors")?.unwrap_or_default(),
            r.guest_stars.optional("guestStars")?.unwrap_or_default(),
        )
        .with_seen(r.seen.optional("seen")?.unwrap_or(false)))
    }
}

impl Codec for Image {
    type Record = ImageRecord;

    fn to_record(&self) -> ImageRecord {
        ImageRecord {
            kind: text(Some(self.kind().as_str())),
            url: text(Some(self.url())),
            thumbnail_url: text(self.thumbnail_url()),
            rating: self.rating().into(),
            rating_count: self.rating_count().into(),
        }
    }

    fn from_record(r: ImageRecord) -> Result<Self, CatalogError> {
        let kind = r
            .kind
            .optional("type")?
            .map_or(ImageKind::Unknown, |raw| ImageKind::parse(&raw));
        Ok(Image::new(kind, r.url.required("url")?)
            .with_thumbnail_url(r.thumbnail_url.optional("thumbnailURL")?)
            .with_rating(r.rating.optional("rating")?, r.rating_count.optional("ratingCount")?))
    }
}

impl Codec for Actor {
    type Record = ActorRecord;

    fn to_record(&self) -> ActorRecord {
        ActorRecord {
            actor_id: text(Some(self.id())),
            name: text(Some(self.name())),
            role: text(self.role()),
            artwork_url: text(self.artwork_url()),
            sort_order: Slot::Set(self.sort_order()),
        }
    }

    fn from_record(r: ActorRecord) -> Result<Self, CatalogError> {
        Ok(Actor::new(
            r.actor_id.required("actorID")?,
            r.name.optional("name")?.unwrap_or_default(),
            r.sort_order.optional("sortOrder")?.unwrap_or_default(),
        )
        .with_role(r.role.optional("role")?)
        .with_artwork_url(r.artwork_url.optional("artworkURL")?))
    }
}

fn text(value: Option<&str>) -> Slot<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string).into()
}

/// Decode a nested record list, prefixing errors with `field[idx]`.
fn nested<T>(slot: Slot<Vec<T::Record>>, field: &str) -> Result<Vec<T>, CatalogError>
where
    T: Codec,
    Vec<T::Record>: Expected,
{
    slot.optional(field)?
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(idx, record)| T::from_record(record).map_err(|e| e.within(&format!("{field}[{idx}]"))))
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}
