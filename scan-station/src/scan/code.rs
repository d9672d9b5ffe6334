//! Scan payload classification
//!
//! Control codes are printed as `CITY:<id>` / `BOX:<id>` labels; everything
//! else is an item barcode. Cyrillic anywhere in the payload wins over every
//! other rule: it means the scanner keyboard layout was wrong or the QR
//! content got mangled, and such a payload must never be interpreted.

/// One classified scan payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCode {
    /// Payload contains Cyrillic; carries the raw text for the error record
    Cyrillic(String),
    /// `CITY:<id>` - open (or re-log) a city; id case is preserved
    CityOpen(String),
    /// `CITY:CLOSE` in any letter case
    CityClose,
    /// `BOX:<id>` - open or close a box, depending on session state
    Box(String),
    /// Plain item barcode
    Item(String),
}

impl ScanCode {
    /// Classify a raw scan payload. Prefix matching is ASCII-case-insensitive
    /// while the id suffix keeps its case.
    pub fn classify(raw: &str) -> ScanCode {
        if has_cyrillic(raw) {
            return ScanCode::Cyrillic(raw.to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(raw, "CITY:") {
            if rest.eq_ignore_ascii_case("CLOSE") {
                return ScanCode::CityClose;
            }
            return ScanCode::CityOpen(rest.to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(raw, "BOX:") {
            return ScanCode::Box(rest.to_string());
        }
        ScanCode::Item(raw.to_string())
    }
}

/// True if the text contains any Cyrillic letter the rejection rule covers
/// (а-я, А-Я and both cases of ё).
pub fn has_cyrillic(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё'))
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if !text.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = text.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix).then_some(tail)
}
