//! Normalized Bible document model: books, chapters and verses

/// A single verse with plain text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verse {
    /// Canonical reference `"{BookId}.{Chapter}.{Verse}"`
    pub id: String,
    /// 1-based verse number within its chapter
    pub number: u32,
    /// Text with markup stripped and whitespace collapsed
    pub text: String,
}

/// A chapter's verses in document order
///
/// Verse numbers are kept as resolved; gaps are not renumbered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based chapter number within its book
    pub number: u32,
    /// Verses in document order
    pub verses: Vec<Verse>,
}

impl Chapter {
    /// Find a verse by number
    pub fn verse(&self, number: u32) -> Option<&Verse> {
        self.verses.iter().find(|v| v.number == number)
    }
}

/// One book of a loaded Bible version
///
/// Immutable once built: the chapter and verse totals are computed in
/// [`Book::new`] and always match the chapters held.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Book {
    id: String,
    name: String,
    title: Option<String>,
    chapters: Vec<Chapter>,
    total_chapters: usize,
    total_verses: usize,
}

impl Book {
    /// Build a book and compute its totals.
    ///
    /// `title` is the explicit title found in the source, kept so the display
    /// name can be recomputed for another language.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        title: Option<String>,
        chapters: Vec<Chapter>,
    ) -> Self {
        let total_chapters = chapters.len();
        let total_verses = chapters.iter().map(|c| c.verses.len()).sum();
        Self {
            id: id.into(),
            name: name.into(),
            title,
            chapters,
            total_chapters,
            total_verses,
        }
    }

    /// OSIS book id (e.g. `"Gen"`, `"1Cor"`)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolved display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Title found in the source XML, if any
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Chapters in document order
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Find a chapter by number
    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Number of chapters
    pub fn total_chapters(&self) -> usize {
        self.total_chapters
    }

    /// Number of verses across all chapters
    pub fn total_verses(&self) -> usize {
        self.total_verses
    }

    /// Same book under a different display name
    pub(crate) fn renamed(&self, name: String) -> Self {
        Self {
            name,
            ..self.clone()
        }
    }
}
