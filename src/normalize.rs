//! Cleanup of text scraped from platform pages.
//!
//! Every title that leaves the extractors goes through [`normalize`]; ordinal
//! prefixes are peeled off with [`extract_ordinal`], which never fails and
//! reports `0` when no number could be read.

use std::sync::LazyLock;

use regex::Regex;

/// Characters that show up as markup or punctuation artifacts in titles.
const STRIPPED_SYMBOLS: &[char] = &[
    '<', '>', '.', ':', ';', '\'', '"', '/', '\\', '|', '?', '!', '¡', '¿', 'º', '%', '&', '~',
    'ª', '*', '+', '=', '@', '#', '$', '[', ']', '{', '}', '(', ')',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalPattern {
    /// `Clase 03 - Título`
    Video,
    /// `03- Curso`, the remainder being the class type.
    Class,
    /// `Módulo 2`
    Module,
    /// `Bootcamp de ...`, never carries a number.
    BootcampName,
    /// `Curso de ...`, never carries a number.
    CourseName,
}

static VIDEO_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^clase\s*(\d+)\s*-?\s*(.*)$").expect("valid regex"));
static CLASS_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*-\s*(.*)$").expect("valid regex"));
static MODULE_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^m[óo]dulo\s*(\d+)\s*-?\s*(.*)$").expect("valid regex"));
static BOOTCAMP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^bootcamp\b(?:\s+de\b)?\s*(.*)$").expect("valid regex"));
static COURSE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^curso\b(?:\s+de\b)?\s*(.*)$").expect("valid regex"));

/// Collapses whitespace (newlines included), strips symbol artifacts and
/// capitalizes the first character.
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|ch| !STRIPPED_SYMBOLS.contains(ch))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    capitalize_first(&collapsed)
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Splits `raw` into `(sequence, remainder)`; falls back to
/// `(0, normalize(raw))` when the pattern does not apply.
pub fn extract_ordinal(raw: &str, pattern: OrdinalPattern) -> (u32, String) {
    let text = normalize(raw);
    let fallback = || (0, text.clone());

    match pattern {
        OrdinalPattern::Video | OrdinalPattern::Class | OrdinalPattern::Module => {
            let regex = match pattern {
                OrdinalPattern::Video => &*VIDEO_ORDINAL,
                OrdinalPattern::Class => &*CLASS_ORDINAL,
                _ => &*MODULE_ORDINAL,
            };
            let Some(captures) = regex.captures(&text) else {
                return fallback();
            };
            let Some(sequence) = captures
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                return fallback();
            };
            let remainder = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            (sequence, normalize(remainder))
        }
        OrdinalPattern::BootcampName | OrdinalPattern::CourseName => {
            let regex = match pattern {
                OrdinalPattern::BootcampName => &*BOOTCAMP_NAME,
                _ => &*COURSE_NAME,
            };
            let remainder = regex
                .captures(&text)
                .and_then(|captures| captures.get(1))
                .map(|m| normalize(m.as_str()))
                .unwrap_or_default();
            if remainder.is_empty() {
                return fallback();
            }
            (0, remainder)
        }
    }
}
