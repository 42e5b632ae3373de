//! Contingency table and cause matcher.
//!
//! The table maps two-digit contingency codes to the canonical phrase
//! operators must use. Resolution is two-phase: canonical phrases first, then
//! a synonym dictionary whose entries are mapped back to a table code.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ReferenceError;
use crate::validation::normalize::{fold_accents, normalize_upper};
use crate::validation::types::CauseSlot;

/// Generic "other causes" code. Accepted in a structural code even when no
/// cause phrase was detected.
pub const OTHER_CAUSES_CODE: &str = "17";

/// Codes used when a synonym's canonical phrase is missing from the table.
const FALLBACK_CODES: &[(&str, &str)] = &[
    ("PROBLEMAS TÉCNICOS", "03"),
    ("PROBLEMAS OPERATIVOS", "05"),
    ("OTRAS CONTINGENCIAS", OTHER_CAUSES_CODE),
];

/// Informal phrasings operators use, keyed by canonical phrase.
const BUILTIN_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "PROBLEMAS TÉCNICOS",
        &[
            "PROBLEMAS TECNICOS",
            "FALLA TECNICA",
            "DESPERFECTOS TECNICOS",
            "INCONVENIENTES TECNICOS",
            "TECNICOS",
            "TECNICO",
        ],
    ),
    (
        "PROBLEMAS OPERATIVOS",
        &[
            "PROBLEMAS OPERATIVOS",
            "FALLA OPERATIVA",
            "INCONVENIENTES OPERATIVOS",
            "OPERATIVOS",
            "OPERATIVO",
        ],
    ),
    (
        "OTRAS CONTINGENCIAS",
        &["OTRAS CONTINGENCIAS", "OTRA CAUSA", "CAUSA DESCONOCIDA"],
    ),
    (
        "ACCIDENTE EN PASO A NIVEL",
        &[
            "ACCIDENTE",
            "ACCIDENTE PAN",
            "COLISION",
            "EMBESTIDA",
            "ACCIDENTE EN VÍA",
        ],
    ),
    (
        "OBRA EN ZONA DE VÍAS",
        &["OBRA", "OBRAS", "TRABAJOS EN VIA", "REPARACION DE VÍA"],
    ),
    (
        "MANIFESTACIÓN / PIQUETE",
        &["MANIFESTACION", "PIQUETE", "CORTE DE VIA", "PROTESTA"],
    ),
];

const CODE_COLUMNS: &[&str] = &["codigo", "code", "cod"];
const PHRASE_COLUMNS: &[&str] = &[
    "forma_comunicacion",
    "formas_de_comunicacion",
    "forma_de_comunicacion",
    "canonical_phrase",
    "phrase",
];
const SYNONYM_COLUMNS: &[&str] = &["sinonimos", "synonyms"];

/// One row of the contingency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyEntry {
    /// Two-digit code.
    pub code: String,
    /// Canonical communication phrase (uppercase).
    pub phrase: String,
    /// Table-provided synonyms, in addition to the built-in dictionary.
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone)]
struct PhraseMatcher {
    regex: Regex,
    code: String,
    /// Reported as the literal that triggered the match.
    phrase: String,
}

/// Loaded contingency table with its compiled matchers.
#[derive(Debug, Clone, Default)]
pub struct ContingencyTable {
    entries: Vec<ContingencyEntry>,
    canonical: Vec<PhraseMatcher>,
    synonyms: Vec<PhraseMatcher>,
}

impl ContingencyTable {
    /// Empty table: every cause lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from entries. Duplicate codes and synonyms claimed by two codes
    /// are logged and skipped (first one wins).
    pub fn from_entries(entries: Vec<ContingencyEntry>) -> Self {
        let mut seen_codes = HashMap::new();
        let mut unique = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.code = pad_code(&entry.code);
            entry.phrase = normalize_upper(&entry.phrase);
            if let Some(existing) = seen_codes.get(&entry.code) {
                warn!(
                    code = %entry.code,
                    kept = %existing,
                    skipped = %entry.phrase,
                    "Duplicate contingency code, skipping row"
                );
                continue;
            }
            seen_codes.insert(entry.code.clone(), entry.phrase.clone());
            unique.push(entry);
        }

        let canonical = unique
            .iter()
            .map(|e| PhraseMatcher {
                regex: phrase_regex(&e.phrase),
                code: e.code.clone(),
                phrase: e.phrase.clone(),
            })
            .collect();

        let synonyms = build_synonyms(&unique);

        debug!(
            entries = unique.len(),
            synonyms = synonyms.len(),
            "Contingency table built"
        );

        let table = Self {
            entries: unique,
            canonical,
            synonyms,
        };
        table.warn_on_scheme_drift();
        table
    }

    /// Load a JSON array of rows. Column names are normalized (case, spaces,
    /// accents) so both the source spreadsheet headers and English keys work.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ReferenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&raw).map_err(|source| ReferenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_rows(&doc)
    }

    /// Build from an already-parsed JSON document.
    pub fn from_rows(doc: &Value) -> Result<Self, ReferenceError> {
        let rows = doc.as_array().ok_or_else(|| ReferenceError::MalformedRow {
            row: 0,
            reason: "contingency table must be a JSON array of rows".into(),
        })?;

        let mut entries = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            match parse_row(idx, row) {
                Ok(entry) => entries.push(entry),
                Err(e @ ReferenceError::MissingColumn { .. }) if idx == 0 => return Err(e),
                Err(e) => warn!(error = %e, "Skipping contingency row"),
            }
        }

        Ok(Self::from_entries(entries))
    }

    /// Resolve the cause stated in normalized uppercase text.
    pub fn resolve(&self, upper: &str) -> Option<CauseSlot> {
        self.canonical
            .iter()
            .chain(self.synonyms.iter())
            .find(|m| m.regex.is_match(upper))
            .map(|m| CauseSlot {
                code: m.code.clone(),
                phrase: m.phrase.clone(),
            })
    }

    /// Code of a canonical phrase, compared accent-insensitively.
    pub fn code_for_phrase(&self, phrase: &str) -> Option<&str> {
        let wanted = fold_accents(&normalize_upper(phrase));
        self.entries
            .iter()
            .find(|e| fold_accents(&e.phrase) == wanted)
            .map(|e| e.code.as_str())
    }

    /// The loaded table is authoritative; disagreement with the current code
    /// scheme is reported, not patched.
    fn warn_on_scheme_drift(&self) {
        for (phrase, expected) in FALLBACK_CODES {
            if let Some(code) = self.code_for_phrase(phrase)
                && code != *expected
            {
                warn!(
                    phrase = %phrase,
                    table_code = %code,
                    expected_code = %expected,
                    "Contingency table code differs from the current code scheme; using table value"
                );
            }
        }
    }

    pub fn entries(&self) -> &[ContingencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in synonyms first, then table-provided ones. Each synonym resolves
/// to one code; a synonym whose canonical phrase has no code is dropped.
fn build_synonyms(entries: &[ContingencyEntry]) -> Vec<PhraseMatcher> {
    let lookup = |canonical: &str| -> Option<String> {
        let wanted = fold_accents(canonical);
        entries
            .iter()
            .find(|e| fold_accents(&e.phrase) == wanted)
            .map(|e| e.code.clone())
            .or_else(|| {
                FALLBACK_CODES
                    .iter()
                    .find(|(p, _)| fold_accents(p) == wanted)
                    .map(|(_, c)| c.to_string())
            })
    };

    let builtin = BUILTIN_SYNONYMS.iter().flat_map(|&(canonical, words)| {
        let code = lookup(canonical);
        words.iter().map(move |w| (w.to_string(), code.clone()))
    });
    let from_table = entries.iter().flat_map(|e| {
        e.synonyms
            .iter()
            .map(move |w| (normalize_upper(w), Some(e.code.clone())))
    });

    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut matchers = Vec::new();
    for (synonym, code) in builtin.chain(from_table) {
        let Some(code) = code else { continue };
        let key = fold_accents(&synonym);
        match claimed.get(&key) {
            Some(owner) if *owner == code => continue,
            Some(owner) => {
                warn!(
                    synonym = %synonym,
                    kept = %owner,
                    skipped = %code,
                    "Synonym mapped to two contingency codes, keeping the first"
                );
                continue;
            }
            None => {}
        }
        claimed.insert(key, code.clone());
        matchers.push(PhraseMatcher {
            regex: phrase_regex(&synonym),
            code,
            phrase: synonym,
        });
    }
    matchers
}

fn parse_row(idx: usize, row: &Value) -> Result<ContingencyEntry, ReferenceError> {
    let obj = row.as_object().ok_or_else(|| ReferenceError::MalformedRow {
        row: idx,
        reason: "row is not an object".into(),
    })?;

    let column = |names: &[&str]| {
        obj.iter()
            .find(|(k, _)| names.contains(&normalize_column(k).as_str()))
            .map(|(_, v)| v)
    };

    let code = match column(CODE_COLUMNS) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(ReferenceError::MalformedRow {
                row: idx,
                reason: format!("code must be a string or number, got {other}"),
            });
        }
        None => return Err(ReferenceError::MissingColumn { column: "code" }),
    };

    let phrase = match column(PHRASE_COLUMNS) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(_) => {
            return Err(ReferenceError::MalformedRow {
                row: idx,
                reason: format!("code {code} has no communication phrase"),
            });
        }
        None => return Err(ReferenceError::MissingColumn { column: "phrase" }),
    };

    let synonyms = column(SYNONYM_COLUMNS)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ContingencyEntry {
        code,
        phrase,
        synonyms,
    })
}

fn normalize_column(name: &str) -> String {
    fold_accents(name.trim())
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn pad_code(code: &str) -> String {
    format!("{:0>2}", code.trim())
}

/// Word-boundary-safe, whitespace-flexible, vowel-accent-tolerant pattern.
fn phrase_regex(phrase: &str) -> Regex {
    let body = phrase
        .split_whitespace()
        .map(|word| {
            word.chars()
                .flat_map(char::to_uppercase)
                .map(|c| match c {
                    'A' | 'Á' => "[AÁ]".to_string(),
                    'E' | 'É' => "[EÉ]".to_string(),
                    'I' | 'Í' => "[IÍ]".to_string(),
                    'O' | 'Ó' => "[OÓ]".to_string(),
                    'U' | 'Ú' | 'Ü' => "[UÚÜ]".to_string(),
                    other => regex::escape(&other.to_string()),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(r"\s+");
    let pattern = format!(r"(?:^|[^\p{{L}}\p{{N}}]){body}(?:[^\p{{L}}\p{{N}}]|$)");
    Regex::new(&pattern).expect("escaped phrase always forms a valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ContingencyTable {
        ContingencyTable::from_rows(&json!([
            {"Código": 1, "Forma Comunicación": "ACCIDENTE EN PASO A NIVEL"},
            {"Código": "3", "Forma Comunicación": "PROBLEMAS TÉCNICOS"},
            {"Código": "05", "Forma Comunicación": "PROBLEMAS OPERATIVOS"},
            {"Código": "12", "Forma Comunicación": "OBRA EN ZONA DE VÍAS"},
            {"Código": "17", "Forma Comunicación": "OTRAS CONTINGENCIAS"},
        ]))
        .unwrap()
    }

    #[test]
    fn loads_and_pads_codes() {
        let table = sample();
        assert_eq!(table.len(), 5);
        assert_eq!(table.code_for_phrase("problemas tecnicos"), Some("03"));
        assert_eq!(table.code_for_phrase("ACCIDENTE EN PASO A NIVEL"), Some("01"));
    }

    #[test]
    fn table_code_wins_over_current_scheme() {
        let table = ContingencyTable::from_rows(&json!([
            {"Código": "04", "Forma Comunicación": "PROBLEMAS TÉCNICOS"},
        ]))
        .unwrap();
        assert_eq!(table.code_for_phrase("PROBLEMAS TÉCNICOS"), Some("04"));
        assert_eq!(table.resolve("POR UNA FALLA TECNICA").unwrap().code, "04");
    }

    #[test]
    fn canonical_phrase_match() {
        let cause = sample().resolve("POR PROBLEMAS TÉCNICOS 03.1.A").unwrap();
        assert_eq!(cause.code, "03");
        assert_eq!(cause.phrase, "PROBLEMAS TÉCNICOS");
    }

    #[test]
    fn canonical_phrase_tolerates_missing_accents() {
        let cause = sample().resolve("POR PROBLEMAS TECNICOS").unwrap();
        assert_eq!(cause.code, "03");
    }

    #[test]
    fn synonym_maps_to_table_code() {
        let table = sample();
        let exact = table.resolve("POR PROBLEMAS TÉCNICOS").unwrap();
        let informal = table.resolve("POR UNA FALLA TECNICA").unwrap();
        assert_eq!(exact.code, informal.code);
        assert_eq!(informal.phrase, "FALLA TECNICA");
    }

    #[test]
    fn synonym_falls_back_when_phrase_absent() {
        let table = ContingencyTable::from_entries(vec![]);
        let cause = table.resolve("POR INCONVENIENTES OPERATIVOS").unwrap();
        assert_eq!(cause.code, "05");
    }

    #[test]
    fn synonyms_without_code_are_ignored() {
        // "PIQUETE" has no table row and no fallback code
        let table = ContingencyTable::from_entries(vec![]);
        assert!(table.resolve("POR UN PIQUETE").is_none());
    }

    #[test]
    fn word_boundaries_respected() {
        let table = sample();
        // MANIOBRA must not trigger the OBRA synonym
        assert!(table.resolve("POR MANIOBRAS EN ESTACION").is_none());
    }

    #[test]
    fn table_synonyms_are_merged() {
        let table = ContingencyTable::from_rows(&json!([
            {"code": "09", "canonical_phrase": "CONDICIONES CLIMÁTICAS", "synonyms": ["TEMPORAL", "LLUVIA"]},
        ]))
        .unwrap();
        let cause = table.resolve("DEBIDO AL TEMPORAL").unwrap();
        assert_eq!(cause.code, "09");
    }

    #[test]
    fn duplicate_codes_keep_first() {
        let table = ContingencyTable::from_entries(vec![
            ContingencyEntry {
                code: "03".into(),
                phrase: "PROBLEMAS TÉCNICOS".into(),
                synonyms: vec![],
            },
            ContingencyEntry {
                code: "3".into(),
                phrase: "OTRA COSA".into(),
                synonyms: vec![],
            },
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].phrase, "PROBLEMAS TÉCNICOS");
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = ContingencyTable::from_rows(&json!([{"descripcion": "x"}])).unwrap_err();
        assert!(matches!(err, ReferenceError::MissingColumn { column: "code" }));
    }

    #[test]
    fn non_array_document_is_rejected() {
        assert!(ContingencyTable::from_rows(&json!({"rows": []})).is_err());
    }

    #[test]
    fn no_cause() {
        assert!(sample().resolve("EL TREN 1 CIRCULA").is_none());
    }
}
