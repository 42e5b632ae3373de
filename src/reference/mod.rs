//! Reference data: contingency table, curator override rules, per-line
//! technical-term allowlists, and the registry that owns them.

pub mod contingency;
pub mod registry;
pub mod rules;
pub mod terms;

pub use contingency::{ContingencyEntry, ContingencyTable};
pub use registry::ReferenceRegistry;
pub use rules::{OverrideAction, OverrideRule, RuleScope, RuleSet};
pub use terms::{TermAllowlist, TermCatalog};

use crate::validation::normalize::fold_accents;

/// Directory-style key for a line name: lowercase, no accents, spaces as
/// `_`. Every San Martín variant collapses to `san_martin`.
pub fn line_key(line: &str) -> String {
    let key = fold_accents(line.trim())
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let key = key
        .strip_prefix("linea_")
        .map(str::to_string)
        .unwrap_or(key);
    if key.contains("san_martin") {
        "san_martin".to_string()
    } else {
        key
    }
}
