//! Verse and chapter references in OSIS form (`"Gen.1.1"`, `"Gen.1"`)
//!
//! Favorites and bookmarks refer to verses by the same id the normalizer
//! builds, so a reference always round-trips through [`VerseRef::to_string`].

use std::fmt;
use std::str::FromStr;

use crate::error::OsisError;

/// A parsed reference to a chapter or a single verse
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VerseRef {
    /// OSIS book id
    pub book_id: String,
    /// 1-based chapter number
    pub chapter: u32,
    /// 1-based verse number; `None` for a whole-chapter reference
    pub verse: Option<u32>,
}

impl VerseRef {
    /// Reference to one verse
    pub fn verse(book_id: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            book_id: book_id.into(),
            chapter,
            verse: Some(verse),
        }
    }

    /// Reference to a whole chapter
    pub fn chapter(book_id: impl Into<String>, chapter: u32) -> Self {
        Self {
            book_id: book_id.into(),
            chapter,
            verse: None,
        }
    }

    /// Parse `Book.Chapter` or `Book.Chapter.Verse`.
    ///
    /// Numbers must be positive integers; anything after the verse is rejected.
    pub fn parse(text: &str) -> Result<Self, OsisError> {
        let invalid = || OsisError::InvalidReference(text.to_string());
        let mut parts = text.trim().split('.');

        let book_id = parts.next().filter(|b| !b.is_empty()).ok_or_else(invalid)?;
        let chapter = parts.next().and_then(parse_positive).ok_or_else(invalid)?;
        let verse = match parts.next() {
            Some(part) => Some(parse_positive(part).ok_or_else(invalid)?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            book_id: book_id.to_string(),
            chapter,
            verse,
        })
    }

    /// Whether this reference covers a whole chapter
    pub fn is_chapter(&self) -> bool {
        self.verse.is_none()
    }

    /// Whether `other` falls under this reference (same verse, or a verse of
    /// this chapter)
    pub fn contains(&self, other: &VerseRef) -> bool {
        self.book_id == other.book_id
            && self.chapter == other.chapter
            && (self.verse.is_none() || self.verse == other.verse)
    }
}

fn parse_positive(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok().filter(|n: &u32| *n > 0)
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verse {
            Some(verse) => write!(f, "{}.{}.{}", self.book_id, self.chapter, verse),
            None => write!(f, "{}.{}", self.book_id, self.chapter),
        }
    }
}

impl FromStr for VerseRef {
    type Err = OsisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerseRef::parse(s)
    }
}
