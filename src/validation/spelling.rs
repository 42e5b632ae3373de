//! Format and spelling checks.
//!
//! An optional external checker reports genuine misspellings; when it is not
//! configured or has failed, a known-typo table and a repeated-letter scan
//! stand in. The multiple-space check runs in both modes.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use tracing::{debug, warn};

use super::matcher::PatternTable;
use crate::error::SpellError;
use crate::reference::terms::TermAllowlist;

/// Shown in place of external results once the checker has failed.
pub const FALLBACK_NOTICE: &str = "Basic orthography: external spell checker unavailable";

/// Domain-specific misspellings and their corrections.
static KNOWN_TYPOS: LazyLock<PatternTable<&'static str>> = LazyLock::new(|| {
    PatternTable::new(&[
        (r"\bSUSPENDIOD\b", "SUSPENDIDO"),
        (r"\bCIRUCLA\b", "CIRCULA"),
        (r"\bCIRUCLAN\b", "CIRCULAN"),
        (r"\bPARTEINEDO\b", "PARTIENDO"),
        (r"\bPARTIDIENDO\b", "PARTIENDO"),
        (r"\bMOOTIVO\b", "MOTIVO"),
        (r"\bMOTIVIO\b", "MOTIVO"),
        (r"\bHACIAA\b", "HACIA"),
        (r"\bHAICIA\b", "HACIA"),
        (r"\bREGISTRAA\b", "REGISTRA"),
        (r"\bREGISTRAAD[OA]\b", "REGISTRADO/A"),
    ])
});

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("space run regex must compile"));

/// Runs of two-or-more spaces tolerated before reporting.
const TOLERATED_SPACE_RUNS: usize = 2;

/// One token flagged by an external checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellFinding {
    pub word: String,
    pub suggestion: Option<String>,
    /// Checker rule that fired; grammar rules are filtered out.
    pub rule_id: String,
}

impl SpellFinding {
    pub fn is_misspelling(&self) -> bool {
        self.rule_id.starts_with("MORFOLOGIK") || self.rule_id.contains("SPELLING")
    }
}

/// A full-dictionary spell checker.
pub trait SpellChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire a session. The session releases its resources when dropped,
    /// on every exit path.
    fn open(&self) -> Result<Box<dyn SpellSession + '_>, SpellError>;
}

/// A live checker session.
pub trait SpellSession {
    fn check(&mut self, text: &str) -> Result<Vec<SpellFinding>, SpellError>;
}

/// Outcome of checking one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellReport {
    pub issues: Vec<String>,
    /// System note for curators, not an operator-facing issue.
    pub notice: Option<String>,
}

/// Orthography checker with permanent fallback after an external failure.
pub struct OrthographyChecker {
    external: Option<Box<dyn SpellChecker>>,
    external_failed: AtomicBool,
}

impl OrthographyChecker {
    /// Typo table and repeated-letter scan only.
    pub fn fallback_only() -> Self {
        Self {
            external: None,
            external_failed: AtomicBool::new(false),
        }
    }

    pub fn with_external(checker: Box<dyn SpellChecker>) -> Self {
        Self {
            external: Some(checker),
            external_failed: AtomicBool::new(false),
        }
    }

    /// Whether the external checker will be consulted.
    pub fn external_active(&self) -> bool {
        self.external.is_some() && !self.external_failed.load(Ordering::Acquire)
    }

    /// Give a failed external checker another chance.
    pub fn retry_external(&self) {
        if self.external.is_some() {
            self.external_failed.store(false, Ordering::Release);
            debug!("External spell checker re-enabled");
        }
    }

    /// Check a message. `raw` is the content as sent (for the space check),
    /// `normalized` its whitespace-collapsed form.
    pub fn check(&self, raw: &str, normalized: &str, allowlist: &TermAllowlist) -> SpellReport {
        let mut report = SpellReport::default();

        let external = match &self.external {
            Some(checker) if self.external_active() => {
                match run_external(checker.as_ref(), normalized, allowlist) {
                    Ok(issues) => Some(issues),
                    Err(e) => {
                        warn!(
                            checker = checker.name(),
                            error = %e,
                            "External spell checker failed, switching to fallback"
                        );
                        self.external_failed.store(true, Ordering::Release);
                        None
                    }
                }
            }
            _ => None,
        };

        match external {
            Some(issues) => report.issues = issues,
            None => {
                if self.external.is_some() {
                    report.notice = Some(FALLBACK_NOTICE.to_string());
                }
                report.issues = fallback_issues(&normalized.to_uppercase(), allowlist);
            }
        }

        if let Some(issue) = space_issue(raw) {
            report.issues.push(issue);
        }
        report
    }
}

fn run_external(
    checker: &dyn SpellChecker,
    text: &str,
    allowlist: &TermAllowlist,
) -> Result<Vec<String>, SpellError> {
    let mut session = checker.open()?;
    let findings = session.check(text)?;
    Ok(findings
        .into_iter()
        .filter(SpellFinding::is_misspelling)
        .filter(|f| !allowlist.contains(&f.word))
        .map(|f| format!("{} → {}", f.word, f.suggestion.as_deref().unwrap_or("?")))
        .collect())
}

fn fallback_issues(upper: &str, allowlist: &TermAllowlist) -> Vec<String> {
    let mut issues: Vec<String> = KNOWN_TYPOS
        .iter()
        .filter_map(|row| {
            let found = row.regex.find(upper)?.as_str();
            (!allowlist.contains(found)).then(|| format!("{found} → {}", row.tag))
        })
        .collect();

    for word in upper.split(|c: char| !c.is_alphabetic()) {
        if !word.is_empty() && has_letter_run(word, 3) && !allowlist.contains(word) {
            issues.push(format!("{word}: letters repeated excessively"));
        }
    }
    issues
}

/// True if some letter repeats `len` or more times in a row.
fn has_letter_run(word: &str, len: usize) -> bool {
    let mut prev = None;
    let mut run = 0;
    for c in word.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= len {
            return true;
        }
    }
    false
}

fn space_issue(raw: &str) -> Option<String> {
    let runs = SPACE_RUNS.find_iter(raw).count();
    (runs > TOLERATED_SPACE_RUNS).then(|| format!("Multiple spaces ({runs} places)"))
}
