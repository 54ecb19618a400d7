//! Loaded Bible document and its read-only query API
//!
//! A [`BibleDocument`] is built once per (version, language) selection and
//! never mutated; switching version or language produces a new document.

use std::collections::HashMap;

use crate::canon::Language;
use crate::model::{Book, Chapter, Verse};
use crate::osis::resolve_name;
use crate::reference::VerseRef;

/// Aggregate counts over a loaded document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of books loaded
    pub total_books: usize,
    /// Sum of chapters over all books
    pub total_chapters: usize,
    /// Sum of verses over all books
    pub total_verses: usize,
}

/// A verse matched by [`BibleDocument::search_verses`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// The matching verse
    pub verse: Verse,
    /// Id of the book containing the verse
    pub book_id: String,
    /// Display name of that book
    pub book_name: String,
    /// Number of the chapter containing the verse
    pub chapter_number: u32,
}

/// An ordered, immutable set of books for one Bible version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BibleDocument {
    version: String,
    language: Language,
    books: Vec<Book>,
    index: HashMap<String, usize>,
}

impl BibleDocument {
    /// Build a document from books already in canonical order.
    ///
    /// If two books share an id, lookups resolve to the first.
    pub fn new(version: impl Into<String>, language: Language, books: Vec<Book>) -> Self {
        let mut index = HashMap::with_capacity(books.len());
        for (idx, book) in books.iter().enumerate() {
            index.entry(book.id().to_string()).or_insert(idx);
        }
        Self {
            version: version.into(),
            language,
            books,
            index,
        }
    }

    /// Version key this document was loaded for
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Display language of the book names
    pub fn language(&self) -> Language {
        self.language
    }

    /// Books in canonical order
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Whether no book was loaded
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Look up a book by id
    pub fn get_book(&self, book_id: &str) -> Option<&Book> {
        self.index.get(book_id).map(|&idx| &self.books[idx])
    }

    /// Look up a chapter by book id and chapter number
    pub fn get_chapter(&self, book_id: &str, chapter_number: u32) -> Option<&Chapter> {
        self.get_book(book_id)?.chapter(chapter_number)
    }

    /// Look up a single verse
    pub fn get_verse(
        &self,
        book_id: &str,
        chapter_number: u32,
        verse_number: u32,
    ) -> Option<&Verse> {
        self.get_chapter(book_id, chapter_number)?.verse(verse_number)
    }

    /// Verses covered by a reference: one verse, or every verse of a chapter.
    ///
    /// Empty when the reference does not resolve.
    pub fn resolve(&self, reference: &VerseRef) -> Vec<&Verse> {
        let Some(chapter) = self.get_chapter(&reference.book_id, reference.chapter) else {
            return Vec::new();
        };
        match reference.verse {
            Some(number) => chapter.verse(number).into_iter().collect(),
            None => chapter.verses.iter().collect(),
        }
    }

    /// Case-insensitive substring search over verse text.
    ///
    /// Scans books, chapters and verses in canonical order with no result
    /// limit. Matching is literal: no diacritic folding or tokenization.
    /// With `book_id`, only that book is scanned. An empty query matches
    /// nothing.
    pub fn search_verses(&self, query: &str, book_id: Option<&str>) -> Vec<SearchHit> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let books: Vec<&Book> = match book_id {
            Some(id) => self.get_book(id).into_iter().collect(),
            None => self.books.iter().collect(),
        };

        let mut hits = Vec::new();
        for book in books {
            for chapter in book.chapters() {
                for verse in &chapter.verses {
                    if verse.text.to_lowercase().contains(&needle) {
                        hits.push(SearchHit {
                            verse: verse.clone(),
                            book_id: book.id().to_string(),
                            book_name: book.name().to_string(),
                            chapter_number: chapter.number,
                        });
                    }
                }
            }
        }
        hits
    }

    /// Aggregate counts
    pub fn stats(&self) -> Stats {
        Stats {
            total_books: self.books.len(),
            total_chapters: self.books.iter().map(Book::total_chapters).sum(),
            total_verses: self.books.iter().map(Book::total_verses).sum(),
        }
    }

    /// A new document with book names resolved for another language.
    ///
    /// Titles found in the source still take precedence; text is not
    /// re-parsed.
    pub fn with_language(&self, language: Language) -> Self {
        let books = self
            .books
            .iter()
            .map(|book| book.renamed(resolve_name(book.id(), book.title(), language)))
            .collect();
        Self::new(self.version.clone(), language, books)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse(book: &str, ch: u32, n: u32, text: &str) -> Verse {
        Verse {
            id: format!("{}.{}.{}", book, ch, n),
            number: n,
            text: text.into(),
        }
    }

    fn sample() -> BibleDocument {
        let gen = Book::new(
            "Gen",
            "Genesis",
            None,
            vec![
                Chapter {
                    number: 1,
                    verses: vec![
                        verse(
                            "Gen",
                            1,
                            1,
                            "In the beginning God created the heavens and the earth",
                        ),
                        verse("Gen", 1, 2, "And the earth was without form"),
                    ],
                },
                Chapter {
                    number: 2,
                    verses: vec![verse("Gen", 2, 1, "Thus the heavens and the earth were finished")],
                },
            ],
        );
        let john = Book::new(
            "John",
            "John",
            None,
            vec![Chapter {
                number: 1,
                verses: vec![verse("John", 1, 1, "In the beginning was the Word")],
            }],
        );
        BibleDocument::new("kjv", Language::English, vec![gen, john])
    }

    #[test]
    fn test_get_book_and_chapter() {
        let doc = sample();
        assert_eq!(doc.get_book("John").map(Book::name), Some("John"));
        assert!(doc.get_book("Rev").is_none());
        assert_eq!(doc.get_chapter("Gen", 2).map(|c| c.verses.len()), Some(1));
        assert!(doc.get_chapter("Gen", 3).is_none());
        assert_eq!(
            doc.get_verse("Gen", 1, 2).map(|v| v.id.as_str()),
            Some("Gen.1.2")
        );
    }

    #[test]
    fn test_search_scenario() {
        let doc = sample();
        let only_gen = doc.search_verses("heavens and the earth were", None);
        assert_eq!(only_gen.len(), 1);
        assert_eq!(only_gen[0].chapter_number, 2);

        let hits = doc.search_verses("created", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].book_id, "Gen");
        assert_eq!(hits[0].book_name, "Genesis");
        assert_eq!(hits[0].chapter_number, 1);
        assert_eq!(hits[0].verse.number, 1);

        assert_eq!(doc.search_verses("CREATED", None), hits);
        assert!(doc.search_verses("xyzzy", None).is_empty());
    }

    #[test]
    fn test_search_order_and_book_filter() {
        let doc = sample();
        let hits = doc.search_verses("beginning", None);
        let ids: Vec<&str> = hits.iter().map(|h| h.verse.id.as_str()).collect();
        assert_eq!(ids, vec!["Gen.1.1", "John.1.1"]);

        let in_john = doc.search_verses("beginning", Some("John"));
        assert_eq!(in_john.len(), 1);
        assert_eq!(in_john[0].book_id, "John");
        assert!(doc.search_verses("beginning", Some("Rev")).is_empty());
    }

    #[test]
    fn test_search_empty_query() {
        assert!(sample().search_verses("", None).is_empty());
    }

    #[test]
    fn test_search_is_literal_for_arabic_diacritics() {
        let book = Book::new(
            "Gen",
            "التكوين",
            None,
            vec![Chapter {
                number: 1,
                verses: vec![verse("Gen", 1, 1, "فِي الْبَدْءِ خَلَقَ اللهُ")],
            }],
        );
        let doc = BibleDocument::new("aravd", Language::Arabic, vec![book]);
        assert_eq!(doc.search_verses("الْبَدْءِ", None).len(), 1);
        assert!(doc.search_verses("البدء", None).is_empty());
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(
            stats,
            Stats {
                total_books: 2,
                total_chapters: 3,
                total_verses: 4
            }
        );
        assert_eq!(
            BibleDocument::new("kjv", Language::English, Vec::new()).stats(),
            Stats::default()
        );
    }

    #[test]
    fn test_resolve_reference() {
        let doc = sample();
        assert_eq!(doc.resolve(&VerseRef::chapter("Gen", 1)).len(), 2);
        assert_eq!(doc.resolve(&VerseRef::verse("Gen", 1, 2)).len(), 1);
        assert!(doc.resolve(&VerseRef::verse("Gen", 1, 9)).is_empty());
        assert!(doc.resolve(&VerseRef::chapter("Rev", 1)).is_empty());
    }

    #[test]
    fn test_with_language_relabels() {
        let titled = Book::new("Gen", "Bereshit", Some("Bereshit".into()), Vec::new());
        let plain = Book::new("Exod", "Exodus", None, Vec::new());
        let doc = BibleDocument::new("kjv", Language::English, vec![titled, plain]);

        let arabic = doc.with_language(Language::Arabic);
        assert_eq!(arabic.language(), Language::Arabic);
        assert_eq!(arabic.get_book("Gen").map(Book::name), Some("Bereshit"));
        assert_eq!(arabic.get_book("Exod").map(Book::name), Some("الخروج"));
        // Receiver keeps its names
        assert_eq!(doc.get_book("Exod").map(Book::name), Some("Exodus"));
    }
}
