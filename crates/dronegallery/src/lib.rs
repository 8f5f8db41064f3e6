//! `dronegallery` - A live gallery of drone image captures
//!
//! This library subscribes to a collection of captured image sets, keeps a
//! view model of them newest first, and renders that view as HTML. A banner
//! appears once the gallery has held a complete set of captures for a moment.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod gallery;
pub mod logging;
pub mod record;
pub mod storage;

pub use collection::{
    CollectionQuery, Direction, DocumentCollection, MemoryCollection, Snapshot, SnapshotEvent,
    Subscription,
};
pub use config::Config;
pub use error::{Error, Result};
pub use gallery::{GallerySettings, GalleryView, LiveGallery, ViewState};
pub use logging::init_logging;
pub use record::{Document, ImageSet, ImageSetRecord, SchemaVariant, Timestamp};
pub use storage::{DocumentStore, SqliteCollection, StoreStats};
