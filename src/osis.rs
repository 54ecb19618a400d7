//! OSIS semantic normalizer
//!
//! Walks a decoded [`Element`] tree, finds book, chapter and verse divisions
//! regardless of which optional attributes are present, and builds [`Book`]
//! values. Missing numbering falls back to document position; a missing book
//! id falls back to the first chapter's id prefix, then to `"Unknown"`.
//!
//! # Usage
//!
//! ```rust
//! use osis_bible::osis::{parse_book_xml, ParseOptions};
//!
//! let xml = r#"<div type="book" osisID="Gen">
//!   <chapter osisID="Gen.1">
//!     <verse osisID="Gen.1.1">In the <w>beginning</w> God created</verse>
//!   </chapter>
//! </div>"#;
//! let book = parse_book_xml(xml, &ParseOptions::default()).unwrap();
//! assert_eq!(book.chapters()[0].verses[0].text, "In the beginning God created");
//! ```

use crate::canon::{book_name, Language};
use crate::error::OsisError;
use crate::model::{Book, Chapter, Verse};
use crate::tree::{decode, Element};

/// Book id used when neither the division nor its chapters carry one
pub const UNKNOWN_BOOK_ID: &str = "Unknown";

/// Options for the normalizer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Language of the display-name table used when the source has no title
    pub language: Language,
}

impl ParseOptions {
    /// Options for a display language
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

/// A resolved chapter or verse number and where it came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Numbering {
    /// Derived from the `osisID` or `n` attribute
    Parsed(u32),
    /// Derived from the 1-based position in document order
    Positional(u32),
}

impl Numbering {
    /// The resolved number
    pub fn value(self) -> u32 {
        match self {
            Numbering::Parsed(n) | Numbering::Positional(n) => n,
        }
    }

    /// Whether the number came from document position
    pub fn is_positional(self) -> bool {
        matches!(self, Numbering::Positional(_))
    }
}

/// Resolve a chapter number.
///
/// Order: digits after the first `.` of the id (`Gen.3` → 3), then the
/// leading integer of `n`, then `position + 1`. Zero never counts as parsed.
pub fn chapter_number(osis_id: Option<&str>, n: Option<&str>, position: usize) -> Numbering {
    resolve_number(osis_id.and_then(|id| id_component(id, 1)), n, position)
}

/// Resolve a verse number.
///
/// Order: digits of the third component of the id (`Gen.1.5` → 5), then
/// the leading integer of `n`, then `position + 1`.
pub fn verse_number(osis_id: Option<&str>, n: Option<&str>, position: usize) -> Numbering {
    resolve_number(osis_id.and_then(|id| id_component(id, 2)), n, position)
}

fn resolve_number(from_id: Option<u32>, n: Option<&str>, position: usize) -> Numbering {
    from_id
        .filter(|v| *v > 0)
        .or_else(|| n.and_then(leading_positive_int))
        .map(Numbering::Parsed)
        .unwrap_or_else(|| Numbering::Positional(u32::try_from(position + 1).unwrap_or(u32::MAX)))
}

/// Leading digits of the `index`-th dot-separated component.
///
/// Components before it must be a non-empty book segment followed by
/// all-digit segments.
fn id_component(osis_id: &str, index: usize) -> Option<u32> {
    let mut parts = osis_id.split('.');
    let book = parts.next()?;
    if book.is_empty() {
        return None;
    }
    for _ in 1..index {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    let part = parts.next()?;
    let digits_len = part.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits_len == 0 {
        return None;
    }
    part[..digits_len].parse().ok()
}

/// Leading integer of an attribute value, accepted only when positive
fn leading_positive_int(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let digits_len = value.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits_len == 0 {
        return None;
    }
    value[..digits_len].parse().ok().filter(|v: &u32| *v > 0)
}

/// Collapse whitespace runs to single spaces and trim both ends
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = true;

    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }

    if result.ends_with(' ') {
        result.pop();
    }

    result
}

/// Identifier attribute of a chapter or verse: `osisID`, then `ID`, then `id`
fn element_id(element: &Element) -> Option<&str> {
    ["osisID", "ID", "id"]
        .iter()
        .filter_map(|key| element.attr(key))
        .find(|value| !value.is_empty())
}

fn is_book_division(div: &Element) -> bool {
    div.attr("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("book"))
}

fn is_book_group(div: &Element) -> bool {
    div.attr("type")
        .is_some_and(|t| t.eq_ignore_ascii_case("bookGroup"))
}

/// All `div` children of a container, flattening `bookGroup` wrappers
fn divisions(container: &Element) -> Vec<&Element> {
    let mut out = Vec::new();
    collect_divisions(container, &mut out);
    out
}

fn collect_divisions<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    for div in container.children_named("div") {
        if is_book_group(div) {
            collect_divisions(div, out);
        } else {
            out.push(div);
        }
    }
}

/// Descendants named `name`, in document order.
///
/// Matches are not descended into, and neither are nested chapters, verses
/// or book divisions.
fn descendants_named<'a>(parent: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
    for child in parent.elements() {
        if child.name == name {
            out.push(child);
        } else if !(child.name == "chapter"
            || child.name == "verse"
            || (child.name == "div" && is_book_division(child)))
        {
            descendants_named(child, name, out);
        }
    }
}

/// A book-like structure: either a real division or bare chapters
struct Division<'a> {
    osis_id: Option<&'a str>,
    title: Option<&'a Element>,
    chapters: Vec<&'a Element>,
}

impl<'a> Division<'a> {
    fn from_div(div: &'a Element) -> Self {
        let mut chapters = Vec::new();
        descendants_named(div, "chapter", &mut chapters);
        Self {
            osis_id: div.attr("osisID").filter(|id| !id.is_empty()),
            title: div.child("title"),
            chapters,
        }
    }

    fn from_chapters(chapters: Vec<&'a Element>) -> Self {
        Self {
            osis_id: None,
            title: None,
            chapters,
        }
    }

    fn book_id(&self) -> String {
        if let Some(id) = self.osis_id {
            return id.to_string();
        }
        self.chapters
            .first()
            .and_then(|ch| element_id(ch))
            .and_then(|id| id.split('.').next())
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or(UNKNOWN_BOOK_ID)
            .to_string()
    }

    fn into_book(self, options: &ParseOptions) -> Book {
        let book_id = self.book_id();
        let title = self
            .title
            .map(|t| normalize_whitespace(&t.text_content()))
            .filter(|t| !t.is_empty());

        let chapters = self
            .chapters
            .iter()
            .enumerate()
            .map(|(idx, ch)| normalize_chapter(&book_id, ch, idx))
            .collect();

        let name = resolve_name(&book_id, title.as_deref(), options.language);
        Book::new(book_id, name, title, chapters)
    }
}

/// Display name precedence: source title, language table, raw id
pub fn resolve_name(book_id: &str, title: Option<&str>, language: Language) -> String {
    title
        .or_else(|| book_name(book_id, language))
        .unwrap_or(book_id)
        .to_string()
}

fn normalize_chapter(book_id: &str, chapter: &Element, position: usize) -> Chapter {
    let number = chapter_number(element_id(chapter), chapter.attr("n"), position);
    if number.is_positional() {
        log::trace!(
            "{}: chapter at position {} has no usable number",
            book_id,
            position + 1
        );
    }
    let number = number.value();

    let mut verse_nodes = Vec::new();
    descendants_named(chapter, "verse", &mut verse_nodes);

    let verses = verse_nodes
        .iter()
        .enumerate()
        .map(|(idx, verse)| {
            let n = verse_number(element_id(verse), verse.attr("n"), idx).value();
            Verse {
                id: format!("{}.{}.{}", book_id, number, n),
                number: n,
                text: normalize_whitespace(&verse.text_content()),
            }
        })
        .collect();

    Chapter { number, verses }
}

/// Convert one decoded book division into a [`Book`]
///
/// Total over any element: missing attributes are covered by the fallback
/// chains, and a division without chapters yields an empty book.
pub fn normalize_book(div: &Element, options: &ParseOptions) -> Book {
    Division::from_div(div).into_book(options)
}

/// Parse a per-book OSIS file.
///
/// Accepted shapes: `osis/osisText/div`, `osisText/div`, a root `div`, a
/// root `chapter`, or a root whose children are chapters. Among several
/// divisions the first `type="book"` one wins, otherwise the first.
pub fn parse_book_xml(xml: &str, options: &ParseOptions) -> Result<Book, OsisError> {
    let root = decode(xml)?;

    if let Some(container) = text_container(&root) {
        let divs = divisions(container);
        if let Some(div) = divs
            .iter()
            .copied()
            .find(|d| is_book_division(d))
            .or_else(|| divs.first().copied())
        {
            return Ok(normalize_book(div, options));
        }
    }

    if root.name == "div" {
        return Ok(normalize_book(&root, options));
    }

    let chapters: Vec<&Element> = if root.name == "chapter" {
        vec![&root]
    } else {
        root.children_named("chapter").collect()
    };
    if !chapters.is_empty() {
        return Ok(Division::from_chapters(chapters).into_book(options));
    }

    Err(OsisError::Structure(format!(
        "no book division or chapters found under <{}>",
        root.name
    )))
}

/// Parse a monolithic OSIS document containing many books.
///
/// Books are returned in document order. Divisions typed `book` and untyped
/// divisions are books; `bookGroup` wrappers are descended into; other typed
/// divisions are skipped.
pub fn parse_osis_document(xml: &str, options: &ParseOptions) -> Result<Vec<Book>, OsisError> {
    let root = decode(xml)?;

    let candidates = match text_container(&root) {
        Some(container) => divisions(container),
        None if root.name == "div" => vec![&root],
        None => Vec::new(),
    };

    let books: Vec<Book> = candidates
        .into_iter()
        .filter(|d| d.attr("type").is_none() || is_book_division(d))
        .map(|d| normalize_book(d, options))
        .collect();

    if books.is_empty() {
        return Err(OsisError::Structure(format!(
            "no book divisions found under <{}>",
            root.name
        )));
    }
    Ok(books)
}

/// The `osisText` element holding book divisions, if the root has one
fn text_container(root: &Element) -> Option<&Element> {
    match root.name.as_str() {
        "osis" => root.child("osisText"),
        "osisText" => Some(root),
        _ => None,
    }
}
