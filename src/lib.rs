//! osis_bible -- OSIS Bible ingestion and query layer
//!
//! Loads a Bible version from OSIS XML, one file per book with a monolithic
//! whole-Bible document as fallback, and exposes the result as an immutable
//! [`BibleDocument`] with lookup, search and statistics.
//!
//! # Features
//!
//! - `async` (default) -- tokio-based [`loader::Loader`] with concurrent
//!   per-book fetches, timeouts and last-request-wins cancellation
//!
//! Without `async`, [`ingest::load_blocking`] runs the same policy
//! synchronously over caller-provided fetch closures.
//!
//! # Logging
//!
//! Diagnostics go through the [`log`] facade: one `warn` per failed book or
//! failed fallback, an `info` summary per load, `debug` for fallback and
//! supersession decisions, and `trace` for positional numbering.

#![warn(missing_docs)]
#![deny(clippy::large_enum_variant, clippy::large_stack_arrays, clippy::redundant_clone)]
#![warn(
    clippy::box_collection,
    clippy::needless_collect,
    clippy::map_clone,
    clippy::implicit_clone,
    clippy::inefficient_to_string
)]

pub mod canon;
pub mod document;
pub mod error;
pub mod ingest;
pub mod model;
pub mod osis;
pub mod reference;
pub mod tree;

#[cfg(feature = "async")]
pub mod loader;

#[cfg(feature = "async")]
pub mod source;

// Re-export key types for convenience
pub use canon::{BibleVersion, Language};
pub use document::{BibleDocument, SearchHit, Stats};
pub use error::OsisError;
pub use ingest::{load_blocking, LoadReport, LoadRequest, LoadedBible};
#[cfg(feature = "async")]
pub use loader::{LoadOptions, LoadState, Loader, LoaderBuilder};
pub use model::{Book, Chapter, Verse};
pub use osis::{parse_book_xml, parse_osis_document, ParseOptions};
pub use reference::VerseRef;
#[cfg(feature = "async")]
pub use source::{BookSource, DirectorySource, MemorySource};
