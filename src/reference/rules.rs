//! Curator override rules and the rule overlay.
//!
//! Rules live in `<root>/<scope>/*.json`, one directory per scope (`global`
//! or a line key). Each document holds a `reglas` array. A rule pairs a
//! regex with an action that replaces the computed verdict when it matches.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::line_key;
use crate::error::RuleError;
use crate::validation::types::{AppliedOverride, ValidationReport, Verdict};

/// What a matching rule does to the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Clear every issue; verdict clean.
    ForceClean,
    /// Keep issues visible; verdict advisory.
    ForceAdvisory,
    /// Verdict blocking, with an issue naming the rule.
    ForceReject,
}

impl OverrideAction {
    /// Accepts the curator tool's action names and the English ones.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "aprobar_sin_obs" | "force_clean" => Some(Self::ForceClean),
            "aprobar_con_obs" | "force_advisory" => Some(Self::ForceAdvisory),
            "rechazar" | "force_reject" => Some(Self::ForceReject),
            _ => None,
        }
    }
}

/// Where a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    /// A line key as produced by [`line_key`].
    Line(String),
}

impl RuleScope {
    /// Scope named by a rule directory.
    pub fn from_dir_name(name: &str) -> Self {
        match line_key(name).as_str() {
            "global" | "globales" => Self::Global,
            key => Self::Line(key.to_string()),
        }
    }

    pub fn applies_to(&self, line: &str) -> bool {
        match self {
            Self::Global => true,
            Self::Line(key) => *key == line_key(line),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

/// One compiled override rule.
#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub id: String,
    pub scope: RuleScope,
    /// Curator's description of the pattern.
    pub pattern: String,
    pub regex: Regex,
    pub action: OverrideAction,
    pub active: bool,
    /// Free-form category set by the curator tool.
    pub kind: Option<String>,
    /// `<scope dir>/<file>` the rule was read from.
    pub origin: String,
}

impl OverrideRule {
    pub fn matches(&self, line: &str, content: &str) -> bool {
        self.active && self.scope.applies_to(line) && self.regex.is_match(content)
    }
}

/// A rule that failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub origin: String,
    pub reason: String,
}

/// Rules in load order, plus the ones that were rejected.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<OverrideRule>,
    skipped: Vec<SkippedRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self {
            rules,
            skipped: Vec::new(),
        }
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn skipped(&self) -> &[SkippedRule] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First active in-scope rule whose regex matches the content.
    pub fn first_match(&self, line: &str, content: &str) -> Option<&OverrideRule> {
        self.rules.iter().find(|r| r.matches(line, content))
    }

    /// Apply the first matching rule to a computed report. Returns the rule
    /// that decided the verdict, if any.
    pub fn apply(&self, report: &mut ValidationReport) -> Option<&OverrideRule> {
        let rule = self.first_match(&report.line, &report.content)?;

        match rule.action {
            OverrideAction::ForceClean => {
                report.issues.clear();
                report.verdict = Verdict::Clean;
            }
            OverrideAction::ForceAdvisory => {
                report.verdict = Verdict::Advisory;
            }
            OverrideAction::ForceReject => {
                report.issues.blocking.push(format!(
                    "Rejected by override rule {}: {}",
                    rule.id, rule.pattern
                ));
                report.verdict = Verdict::Blocking;
            }
        }
        report.requires_notification = report.verdict.requires_notification();
        report.applied_override = Some(AppliedOverride {
            rule_id: rule.id.clone(),
            pattern: rule.pattern.clone(),
            action: rule.action,
            origin: rule.origin.clone(),
        });

        debug!(
            id = %report.id,
            rule = %rule.id,
            action = ?rule.action,
            "Override rule applied"
        );
        Some(rule)
    }
}

/// Where override rules come from.
pub trait RuleSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> String;

    /// Load every rule. Individual bad rules are recorded in
    /// [`RuleSet::skipped`]; only a source-level failure is an error.
    fn load(&self) -> Result<RuleSet, RuleError>;
}

/// Rule collections under a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryRuleSource {
    root: PathBuf,
}

impl DirectoryRuleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scope directories: global ones first, then lines by name.
    fn scope_dirs(&self) -> Result<Vec<(String, PathBuf)>, RuleError> {
        let read_dir = std::fs::read_dir(&self.root).map_err(|source| RuleError::Read {
            path: self.root.clone(),
            source,
        })?;

        let mut dirs: Vec<(String, PathBuf)> = read_dir
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some((name, p))
            })
            .collect();
        dirs.sort_by(|(a, _), (b, _)| {
            let a_global = RuleScope::from_dir_name(a).is_global();
            let b_global = RuleScope::from_dir_name(b).is_global();
            b_global.cmp(&a_global).then_with(|| a.cmp(b))
        });
        Ok(dirs)
    }
}

impl RuleSource for DirectoryRuleSource {
    fn name(&self) -> String {
        self.root.display().to_string()
    }

    fn load(&self) -> Result<RuleSet, RuleError> {
        let mut set = RuleSet::default();

        if !self.root.exists() {
            debug!(root = %self.root.display(), "No rule directory, overlay disabled");
            return Ok(set);
        }

        for (dir_name, dir) in self.scope_dirs()? {
            let scope = RuleScope::from_dir_name(&dir_name);
            let mut files: Vec<PathBuf> = match std::fs::read_dir(&dir) {
                Ok(rd) => rd
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                    .collect(),
                Err(source) => {
                    let err = RuleError::Read { path: dir, source };
                    warn!(error = %err, "Skipping rule scope");
                    set.skipped.push(SkippedRule {
                        origin: dir_name,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            files.sort();

            for file in files {
                let origin = format!(
                    "{}/{}",
                    dir_name,
                    file.file_name().and_then(|n| n.to_str()).unwrap_or("?")
                );
                load_file(&file, &scope, &origin, &mut set);
            }
        }

        info!(
            source = %self.name(),
            rules = set.rules.len(),
            skipped = set.skipped.len(),
            "Override rules loaded"
        );
        Ok(set)
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    reglas: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    patron_detectado: String,
    #[serde(default)]
    regex_sugerido: String,
    #[serde(default)]
    accion_sugerida: Option<String>,
    #[serde(default)]
    accion: Option<String>,
    #[serde(default)]
    tipo: Option<String>,
    /// Narrows a rule to one line regardless of the directory it sits in.
    #[serde(default)]
    linea: Option<String>,
    #[serde(default = "default_active")]
    activa: bool,
}

fn default_active() -> bool {
    true
}

fn load_file(path: &Path, scope: &RuleScope, origin: &str, set: &mut RuleSet) {
    let parsed = std::fs::read_to_string(path)
        .map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|raw| {
            serde_json::from_str::<RuleFile>(&raw).map_err(|source| RuleError::Json {
                path: path.to_path_buf(),
                source,
            })
        });

    let file = match parsed {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "Skipping rule collection");
            set.skipped.push(SkippedRule {
                origin: origin.to_string(),
                reason: e.to_string(),
            });
            return;
        }
    };

    for (idx, raw) in file.reglas.into_iter().enumerate() {
        match compile_rule(raw, idx, scope, origin) {
            Ok(rule) => set.rules.push(rule),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Skipping malformed override rule");
                set.skipped.push(SkippedRule {
                    origin: origin.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn compile_rule(
    raw: RawRule,
    idx: usize,
    scope: &RuleScope,
    origin: &str,
) -> Result<OverrideRule, RuleError> {
    let id = match raw.id {
        Value::String(s) if !s.trim().is_empty() => s,
        Value::Number(n) => n.to_string(),
        _ => format!("{origin}#{idx}"),
    };

    let action_name = raw.accion_sugerida.or(raw.accion).unwrap_or_default();
    let action = OverrideAction::parse(&action_name).ok_or_else(|| RuleError::UnknownAction {
        id: id.clone(),
        action: action_name.clone(),
    })?;

    if raw.regex_sugerido.trim().is_empty() {
        return Err(RuleError::MissingRegex { id });
    }
    let regex = RegexBuilder::new(&raw.regex_sugerido)
        .case_insensitive(true)
        .build()
        .map_err(|source| RuleError::InvalidRegex {
            id: id.clone(),
            source,
        })?;

    let scope = match raw.linea.as_deref().map(str::trim) {
        Some(line) if !line.is_empty() => RuleScope::from_dir_name(line),
        _ => scope.clone(),
    };

    Ok(OverrideRule {
        id,
        scope,
        pattern: raw.patron_detectado,
        regex,
        action,
        active: raw.activa,
        kind: raw.tipo,
        origin: origin.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_rules(root: &Path, scope: &str, file: &str, body: &str) {
        let dir = root.join(scope);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), body).unwrap();
    }

    #[test]
    fn action_names() {
        assert_eq!(
            OverrideAction::parse("aprobar_sin_obs"),
            Some(OverrideAction::ForceClean)
        );
        assert_eq!(
            OverrideAction::parse("APROBAR_CON_OBS"),
            Some(OverrideAction::ForceAdvisory)
        );
        assert_eq!(
            OverrideAction::parse("rechazar"),
            Some(OverrideAction::ForceReject)
        );
        assert!(OverrideAction::parse("ignorar").is_none());
    }

    #[test]
    fn scope_from_directory() {
        assert_eq!(RuleScope::from_dir_name("globales"), RuleScope::Global);
        assert_eq!(RuleScope::from_dir_name("global"), RuleScope::Global);
        let scope = RuleScope::from_dir_name("san_martin");
        assert!(scope.applies_to("Línea San Martín"));
        assert!(!scope.applies_to("Roca"));
    }

    #[test]
    fn loads_global_before_lines() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(
            dir.path(),
            "roca",
            "personalizadas.json",
            r#"{"reglas": [{"id": 2, "patron_detectado": "line", "regex_sugerido": "TREN", "accion_sugerida": "aprobar_con_obs"}]}"#,
        );
        write_rules(
            dir.path(),
            "global",
            "personalizadas.json",
            r#"{"reglas": [{"id": 1, "patron_detectado": "global", "regex_sugerido": "tren", "accion_sugerida": "aprobar_sin_obs"}]}"#,
        );

        let set = DirectoryRuleSource::new(dir.path()).load().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.rules()[0].id, "1");
        assert!(set.rules()[0].scope.is_global());

        let hit = set.first_match("Roca", "EL TREN 5").unwrap();
        assert_eq!(hit.action, OverrideAction::ForceClean);
        assert_eq!(hit.origin, "global/personalizadas.json");
    }

    #[test]
    fn malformed_rules_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(
            dir.path(),
            "global",
            "personalizadas.json",
            r#"{"reglas": [
                {"id": "bad-regex", "regex_sugerido": "(?=X)", "accion_sugerida": "aprobar_sin_obs"},
                {"id": "no-action", "regex_sugerido": "X"},
                {"id": "no-regex", "accion": "rechazar"},
                {"id": "ok", "regex_sugerido": "X", "accion": "rechazar"}
            ]}"#,
        );
        write_rules(dir.path(), "mitre", "broken.json", "{not json");

        let set = DirectoryRuleSource::new(dir.path()).load().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.rules()[0].id, "ok");
        assert_eq!(set.skipped().len(), 4);
    }

    #[test]
    fn inactive_and_out_of_scope_rules_do_not_match() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(
            dir.path(),
            "mitre",
            "personalizadas.json",
            r#"{"reglas": [{"id": 1, "regex_sugerido": "TREN", "accion": "aprobar_sin_obs"}]}"#,
        );
        write_rules(
            dir.path(),
            "global",
            "personalizadas.json",
            r#"{"reglas": [{"id": 2, "regex_sugerido": "TREN", "accion": "aprobar_sin_obs", "activa": false}]}"#,
        );

        let set = DirectoryRuleSource::new(dir.path()).load().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.first_match("Roca", "EL TREN 1").is_none());
        assert!(set.first_match("Mitre", "EL TREN 1").is_some());
    }

    #[test]
    fn rule_line_field_narrows_scope() {
        let dir = tempfile::tempdir().unwrap();
        write_rules(
            dir.path(),
            "global",
            "personalizadas.json",
            r#"{"reglas": [{"id": 1, "regex_sugerido": "TREN", "accion": "rechazar", "linea": "San Martín"}]}"#,
        );

        let set = DirectoryRuleSource::new(dir.path()).load().unwrap();
        assert_eq!(set.rules()[0].scope, RuleScope::Line("san_martin".into()));
        assert!(set.first_match("Linea San Martin", "EL TREN 1").is_some());
        assert!(set.first_match("Roca", "EL TREN 1").is_none());
    }

    #[test]
    fn missing_root_is_empty() {
        let set = DirectoryRuleSource::new("/nonexistent/railcheck/rules")
            .load()
            .unwrap();
        assert!(set.is_empty());
    }
}
