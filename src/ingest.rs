//! Ingestion policy: per-book pass, fallback fill and canonical ordering
//!
//! The steps here are synchronous and side-effect free apart from logging,
//! so the blocking orchestrator ([`load_blocking`]) and the async
//! [`Loader`](crate::loader::Loader) share them.
//!
//! 1. Each expected book is fetched and parsed on its own; a failure is
//!    logged once and the book is skipped.
//! 2. Expected ids absent from the successes form the missing set.
//! 3. When nothing loaded, or something is missing, the monolithic fallback
//!    document is parsed. With no per-book successes every fallback book is
//!    used; otherwise only missing ids are filled and loaded books are never
//!    overwritten.
//! 4. The result is sorted into canonical order.
//! 5. Zero books after both passes is the only failure.

use std::collections::HashSet;
use std::sync::Arc;

use crate::canon::{canonical_order, Language};
use crate::document::BibleDocument;
use crate::error::OsisError;
use crate::model::Book;
use crate::osis::{parse_book_xml, parse_osis_document, ParseOptions};

/// What to load: a version, its display language and expected book order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    /// Version key used by sources to locate files
    pub version: String,
    /// Display language for book names
    pub language: Language,
    /// Expected book ids in canonical order
    pub order: Vec<String>,
}

impl LoadRequest {
    /// Request the full 66-book canon
    pub fn new(version: impl Into<String>, language: Language) -> Self {
        Self {
            version: version.into(),
            language,
            order: canonical_order(),
        }
    }

    /// Restrict the expected books to a version's own subset and order
    pub fn with_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Normalizer options for this request
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::new(self.language)
    }
}

/// How a successful load was assembled
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Ids loaded from their own per-book source, canonical order
    pub per_book: Vec<String>,
    /// Ids taken from the fallback document, canonical order
    pub filled_from_fallback: Vec<String>,
    /// Per-book failures as (expected id, error)
    pub failures: Vec<(String, OsisError)>,
    /// Why the fallback document was unusable, if it was tried and failed
    pub fallback_error: Option<OsisError>,
}

/// A loaded document plus the report of how it was built
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedBible {
    /// The published document
    pub document: Arc<BibleDocument>,
    /// Load diagnostics
    pub report: LoadReport,
}

/// Result of the per-book pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Successfully parsed books
    pub books: Vec<Book>,
    /// Failures as (expected id, error)
    pub failures: Vec<(String, OsisError)>,
}

impl PassOutcome {
    /// Fold per-book results, in canonical order, into successes and failures.
    ///
    /// Each failure is logged exactly once. A parsed book whose id is not
    /// expected, or was already loaded, counts as a failure of the slot it
    /// was fetched for.
    pub fn collect<I>(order: &[String], results: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<Book, OsisError>)>,
    {
        let expected: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut seen: HashSet<String> = HashSet::new();

        results
            .into_iter()
            .fold(PassOutcome::default(), |mut outcome, (slot, result)| {
                let result = result.and_then(|book| {
                    if !expected.contains(book.id()) {
                        Err(OsisError::Structure(format!(
                            "source holds unexpected book '{}'",
                            book.id()
                        )))
                    } else if seen.contains(book.id()) {
                        Err(OsisError::Structure(format!(
                            "source holds already loaded book '{}'",
                            book.id()
                        )))
                    } else {
                        Ok(book)
                    }
                });
                match result {
                    Ok(book) => {
                        seen.insert(book.id().to_string());
                        outcome.books.push(book);
                    }
                    Err(err) => {
                        log::warn!("Failed to load book '{}': {}", slot, err);
                        outcome.failures.push((slot, err));
                    }
                }
                outcome
            })
    }

    /// Expected ids not present among the successes, canonical order
    pub fn missing(&self, order: &[String]) -> Vec<String> {
        let loaded: HashSet<&str> = self.books.iter().map(Book::id).collect();
        order
            .iter()
            .filter(|id| !loaded.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Whether the fallback document has to be consulted
    pub fn needs_fallback(&self, order: &[String]) -> bool {
        self.books.is_empty() || !self.missing(order).is_empty()
    }
}

/// Add fallback books to the per-book successes.
///
/// Returns the ids that were taken from the fallback. With no per-book
/// successes every fallback book is used (first occurrence of an id wins);
/// otherwise only `missing` ids are filled.
pub fn fill_from_fallback(
    books: &mut Vec<Book>,
    fallback: Vec<Book>,
    missing: &[String],
) -> Vec<String> {
    let mut filled = Vec::new();

    if books.is_empty() {
        let mut seen = HashSet::new();
        for book in fallback {
            if seen.insert(book.id().to_string()) {
                filled.push(book.id().to_string());
                books.push(book);
            }
        }
        return filled;
    }

    let wanted: HashSet<&str> = missing.iter().map(String::as_str).collect();
    for book in fallback {
        if wanted.contains(book.id()) && !filled.iter().any(|id| id == book.id()) {
            filled.push(book.id().to_string());
            books.push(book);
        }
    }
    filled
}

/// Stable sort by position in `order`; ids outside it go last in their
/// current order
pub fn sort_canonical(books: &mut [Book], order: &[String]) {
    books.sort_by_key(|book| {
        order
            .iter()
            .position(|id| id == book.id())
            .unwrap_or(usize::MAX)
    });
}

/// Complete a load from the per-book pass and the optional fallback result.
///
/// `fallback` is `None` when the fallback was not needed or is disabled.
pub fn finish(
    request: &LoadRequest,
    pass: PassOutcome,
    fallback: Option<Result<Vec<Book>, OsisError>>,
) -> Result<LoadedBible, OsisError> {
    let missing = pass.missing(&request.order);
    let PassOutcome {
        mut books,
        failures,
    } = pass;
    let per_book: Vec<String> = books.iter().map(|b| b.id().to_string()).collect();

    let mut fallback_error = None;
    let mut filled = Vec::new();
    match fallback {
        Some(Ok(fallback_books)) => {
            filled = fill_from_fallback(&mut books, fallback_books, &missing);
            let unfilled = missing.len().saturating_sub(filled.len());
            if unfilled > 0 && !per_book.is_empty() {
                log::debug!(
                    "Fallback for '{}' lacks {} missing book(s)",
                    request.version,
                    unfilled
                );
            }
        }
        Some(Err(err)) => {
            log::warn!(
                "Failed to load fallback document for '{}': {}",
                request.version,
                err
            );
            fallback_error = Some(err);
        }
        None => {}
    }

    if books.is_empty() {
        return Err(OsisError::NoBooksLoaded {
            version: request.version.clone(),
            cause: fallback_error.map(Box::new),
        });
    }

    sort_canonical(&mut books, &request.order);
    sort_ids_canonical(&mut filled, &request.order);

    log::info!(
        "Loaded {} book(s) for '{}' ({} from fallback, {} failed)",
        books.len(),
        request.version,
        filled.len(),
        failures.len()
    );

    Ok(LoadedBible {
        document: Arc::new(BibleDocument::new(
            request.version.clone(),
            request.language,
            books,
        )),
        report: LoadReport {
            per_book,
            filled_from_fallback: filled,
            failures,
            fallback_error,
        },
    })
}

fn sort_ids_canonical(ids: &mut [String], order: &[String]) {
    ids.sort_by_key(|id| order.iter().position(|o| o == id).unwrap_or(usize::MAX));
}

/// Load a version synchronously.
///
/// `fetch_book` returns the XML for one book id; `fetch_fallback` returns
/// the monolithic document and is called at most once, only when needed.
pub fn load_blocking<F, G>(
    request: &LoadRequest,
    mut fetch_book: F,
    fetch_fallback: G,
) -> Result<LoadedBible, OsisError>
where
    F: FnMut(&str) -> Result<String, OsisError>,
    G: FnOnce() -> Result<String, OsisError>,
{
    let options = request.parse_options();
    let results = request.order.iter().map(|id| {
        let parsed = fetch_book(id).and_then(|xml| parse_book_xml(&xml, &options));
        (id.clone(), parsed)
    });
    let pass = PassOutcome::collect(&request.order, results);

    let fallback = if pass.needs_fallback(&request.order) {
        log::debug!("Consulting fallback document for '{}'", request.version);
        Some(fetch_fallback().and_then(|xml| parse_osis_document(&xml, &options)))
    } else {
        None
    };

    finish(request, pass, fallback)
}
