//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration: where reference data lives and how the optional
/// external spell checker and the batch driver behave.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Contingency table (JSON rows).
    pub contingency_table: PathBuf,
    /// Root of the override-rule collections (`<root>/<scope>/*.json`).
    pub rules_dir: PathBuf,
    /// Directory holding `config_<line>.json` technical-term allowlists.
    pub line_configs_dir: PathBuf,
    /// Line whose allowlist is used when a message's line has none.
    pub default_line: String,
    /// Base URL of a LanguageTool server. `None` keeps the regex fallback.
    pub languagetool_url: Option<String>,
    /// Language code sent to the external checker.
    pub languagetool_language: String,
    /// Upper bound for one external spell-check call.
    pub spell_timeout: Duration,
    /// Messages validated concurrently by the batch driver.
    pub batch_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contingency_table: PathBuf::from("configs/contingencias.json"),
            rules_dir: PathBuf::from("configs/reglas"),
            line_configs_dir: PathBuf::from("configs"),
            default_line: "roca".to_string(),
            languagetool_url: None,
            languagetool_language: "es".to_string(),
            spell_timeout: Duration::from_secs(5),
            batch_workers: 8,
        }
    }
}

impl EngineConfig {
    /// Build from `RAILCHECK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let spell_timeout_ms: u64 = std::env::var("RAILCHECK_SPELL_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.spell_timeout.as_millis() as u64);

        let batch_workers: usize = std::env::var("RAILCHECK_BATCH_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.batch_workers);

        Self {
            contingency_table: std::env::var("RAILCHECK_CONTINGENCIES")
                .map(PathBuf::from)
                .unwrap_or(defaults.contingency_table),
            rules_dir: std::env::var("RAILCHECK_RULES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.rules_dir),
            line_configs_dir: std::env::var("RAILCHECK_LINE_CONFIGS")
                .map(PathBuf::from)
                .unwrap_or(defaults.line_configs_dir),
            default_line: std::env::var("RAILCHECK_DEFAULT_LINE")
                .unwrap_or(defaults.default_line),
            languagetool_url: std::env::var("RAILCHECK_LANGUAGETOOL_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            languagetool_language: std::env::var("RAILCHECK_LANGUAGETOOL_LANG")
                .unwrap_or(defaults.languagetool_language),
            spell_timeout: Duration::from_millis(spell_timeout_ms),
            batch_workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_fallback_checker() {
        let config = EngineConfig::default();
        assert!(config.languagetool_url.is_none());
        assert_eq!(config.default_line, "roca");
        assert_eq!(config.spell_timeout, Duration::from_secs(5));
        assert!(config.batch_workers > 0);
    }
}
