//! Canonical book order, localized display names and version selection
//!
//! Static configuration consumed by the normalizer and the loaders. The
//! order is the standard 66-book OSIS enumeration, Genesis through
//! Revelation.

/// The 66 OSIS book ids in canonical order
pub const CANONICAL_ORDER: [&str; 66] = [
    "Gen", "Exod", "Lev", "Num", "Deut", "Josh", "Judg", "Ruth", "1Sam", "2Sam", "1Kgs", "2Kgs",
    "1Chr", "2Chr", "Ezra", "Neh", "Esth", "Job", "Ps", "Prov", "Eccl", "Song", "Isa", "Jer",
    "Lam", "Ezek", "Dan", "Hos", "Joel", "Amos", "Obad", "Jonah", "Mic", "Nah", "Hab", "Zeph",
    "Hag", "Zech", "Mal", "Matt", "Mark", "Luke", "John", "Acts", "Rom", "1Cor", "2Cor", "Gal",
    "Eph", "Phil", "Col", "1Thess", "2Thess", "1Tim", "2Tim", "Titus", "Phlm", "Heb", "Jas",
    "1Pet", "2Pet", "1John", "2John", "3John", "Jude", "Rev",
];

/// English display names, index-aligned with [`CANONICAL_ORDER`]
const ENGLISH_NAMES: [&str; 66] = [
    "Genesis", "Exodus", "Leviticus", "Numbers", "Deuteronomy", "Joshua", "Judges", "Ruth",
    "1 Samuel", "2 Samuel", "1 Kings", "2 Kings", "1 Chronicles", "2 Chronicles", "Ezra",
    "Nehemiah", "Esther", "Job", "Psalms", "Proverbs", "Ecclesiastes", "Song of Solomon",
    "Isaiah", "Jeremiah", "Lamentations", "Ezekiel", "Daniel", "Hosea", "Joel", "Amos",
    "Obadiah", "Jonah", "Micah", "Nahum", "Habakkuk", "Zephaniah", "Haggai", "Zechariah",
    "Malachi", "Matthew", "Mark", "Luke", "John", "Acts", "Romans", "1 Corinthians",
    "2 Corinthians", "Galatians", "Ephesians", "Philippians", "Colossians", "1 Thessalonians",
    "2 Thessalonians", "1 Timothy", "2 Timothy", "Titus", "Philemon", "Hebrews", "James",
    "1 Peter", "2 Peter", "1 John", "2 John", "3 John", "Jude", "Revelation",
];

/// Arabic display names, index-aligned with [`CANONICAL_ORDER`]
const ARABIC_NAMES: [&str; 66] = [
    "التكوين", "الخروج", "اللاويين", "العدد", "التثنية", "يشوع", "القضاة", "راعوث",
    "صموئيل الأول", "صموئيل الثاني", "الملوك الأول", "الملوك الثاني", "أخبار الأيام الأول",
    "أخبار الأيام الثاني", "عزرا", "نحميا", "أستير", "أيوب", "المزامير", "الأمثال", "الجامعة",
    "نشيد الأنشاد", "إشعياء", "إرميا", "مراثي إرميا", "حزقيال", "دانيال", "هوشع", "يوئيل",
    "عاموس", "عوبديا", "يونان", "ميخا", "ناحوم", "حبقوق", "صفنيا", "حجاي", "زكريا", "ملاخي",
    "متى", "مرقس", "لوقا", "يوحنا", "أعمال الرسل", "رومية", "كورنثوس الأولى",
    "كورنثوس الثانية", "غلاطية", "أفسس", "فيلبي", "كولوسي", "تسالونيكي الأولى",
    "تسالونيكي الثانية", "تيموثاوس الأول", "تيموثاوس الثاني", "تيطس", "فليمون", "عبرانيين",
    "يعقوب", "بطرس الأولى", "بطرس الثانية", "يوحنا الأولى", "يوحنا الثانية", "يوحنا الثالثة",
    "يهودا", "سفر الرؤيا",
];

/// Display language for book names
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Language {
    /// English names
    #[default]
    English,
    /// Arabic names
    Arabic,
}

impl Language {
    /// Map a locale code to a display language.
    ///
    /// `"ar"` and its regional variants select Arabic; everything else is
    /// English.
    pub fn from_code(code: &str) -> Self {
        let primary = code.split(['-', '_']).next().unwrap_or(code);
        if primary.eq_ignore_ascii_case("ar") {
            Language::Arabic
        } else {
            Language::English
        }
    }

    /// Two-letter locale code
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Arabic => "ar",
        }
    }

    fn names(self) -> &'static [&'static str; 66] {
        match self {
            Language::English => &ENGLISH_NAMES,
            Language::Arabic => &ARABIC_NAMES,
        }
    }
}

/// Position of a book id in the canonical order
pub fn canonical_index(book_id: &str) -> Option<usize> {
    CANONICAL_ORDER.iter().position(|id| *id == book_id)
}

/// Localized display name from the static table, if the id is canonical
pub fn book_name(book_id: &str, language: Language) -> Option<&'static str> {
    canonical_index(book_id).map(|idx| language.names()[idx])
}

/// Canonical order as owned ids, for building load requests
pub fn canonical_order() -> Vec<String> {
    CANONICAL_ORDER.iter().map(|id| (*id).to_string()).collect()
}

/// Bible versions with bundled sources
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum BibleVersion {
    /// King James Version (English)
    Kjv,
    /// Arabic Van Dyck, with diacritics
    Aravd,
    /// Arabic Smith & Van Dyck, alternative edition
    Arasvd,
}

impl BibleVersion {
    /// Source key used to locate this version's files
    pub fn key(self) -> &'static str {
        match self {
            BibleVersion::Kjv => "kjv",
            BibleVersion::Aravd => "aravd",
            BibleVersion::Arasvd => "arasvd",
        }
    }

    /// Parse a source key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "kjv" => Some(BibleVersion::Kjv),
            "aravd" => Some(BibleVersion::Aravd),
            "arasvd" => Some(BibleVersion::Arasvd),
            _ => None,
        }
    }

    /// Language of the version's text
    pub fn language(self) -> Language {
        match self {
            BibleVersion::Kjv => Language::English,
            BibleVersion::Aravd | BibleVersion::Arasvd => Language::Arabic,
        }
    }

    /// Pick the version to load for a display language.
    ///
    /// A stored choice is kept when it matches the language; otherwise the
    /// language default applies (`Aravd` for Arabic, `Kjv` for English).
    pub fn for_language(stored: Option<BibleVersion>, language: Language) -> Self {
        match (language, stored) {
            (Language::Arabic, Some(v @ (BibleVersion::Aravd | BibleVersion::Arasvd))) => v,
            (Language::Arabic, _) => BibleVersion::Aravd,
            (Language::English, _) => BibleVersion::Kjv,
        }
    }
}
