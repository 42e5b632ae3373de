//! Ordered `{pattern, tag}` tables.
//!
//! Type, status and format detection are all "first pattern that matches
//! wins" lookups. The table keeps that priority explicit in data instead of
//! in nested if/else chains.

use regex::{Captures, Regex};

/// One row: a compiled pattern and the tag it yields.
#[derive(Debug, Clone)]
pub struct TaggedPattern<T> {
    pub regex: Regex,
    pub tag: T,
}

/// Patterns evaluated in insertion order; the first match wins.
#[derive(Debug, Clone)]
pub struct PatternTable<T> {
    rows: Vec<TaggedPattern<T>>,
}

impl<T: Copy> PatternTable<T> {
    /// Build a table from `(pattern, tag)` pairs.
    ///
    /// The patterns are compile-time literals, so an invalid one is a
    /// programming error.
    pub fn new(rows: &[(&str, T)]) -> Self {
        let rows = rows
            .iter()
            .map(|(pattern, tag)| TaggedPattern {
                regex: Regex::new(pattern).expect("pattern table literal must compile"),
                tag: *tag,
            })
            .collect();
        Self { rows }
    }

    /// Tag of the first matching row.
    pub fn first_tag(&self, text: &str) -> Option<T> {
        self.rows
            .iter()
            .find(|row| row.regex.is_match(text))
            .map(|row| row.tag)
    }

    /// Tag and captures of the first matching row.
    pub fn first_captures<'t>(&self, text: &'t str) -> Option<(T, Captures<'t>)> {
        self.rows
            .iter()
            .find_map(|row| row.regex.captures(text).map(|caps| (row.tag, caps)))
    }

    /// Every row, for callers that need all matches rather than the first.
    pub fn iter(&self) -> impl Iterator<Item = &TaggedPattern<T>> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trimmed text of capture group `idx`, if it participated and is non-empty.
pub fn group(caps: &Captures<'_>, idx: usize) -> Option<String> {
    caps.get(idx)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
