pub mod codec;
pub mod library;
pub mod persistence;

pub use codec::{ActorRecord, Codec, DecodeReport, EpisodeRecord, ImageRecord, ShowRecord, Slot};
pub use library::{BlobStore, FileStore, Library, MemoryStore};
pub use persistence::{decode_shows, encode_shows};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed library: {0}")]
    Format(String),
}
