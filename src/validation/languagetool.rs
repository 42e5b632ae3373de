//! LanguageTool HTTP client.
//!
//! Talks to a LanguageTool server's `/v2/check` endpoint with a blocking
//! client. Each session owns its client and is bounded by the configured
//! timeout. Must be used from a blocking context, never directly on an async
//! runtime thread.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::spelling::{SpellChecker, SpellFinding, SpellSession};
use crate::error::SpellError;

const CHECKER_NAME: &str = "languagetool";

/// LanguageTool server configuration.
#[derive(Debug, Clone)]
pub struct LanguageToolChecker {
    base_url: String,
    language: String,
    timeout: Duration,
}

impl LanguageToolChecker {
    pub fn new(base_url: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: language.into(),
            timeout,
        }
    }

    fn check_url(&self) -> String {
        format!("{}/v2/check", self.base_url)
    }
}

impl SpellChecker for LanguageToolChecker {
    fn name(&self) -> &str {
        CHECKER_NAME
    }

    fn open(&self) -> Result<Box<dyn SpellSession + '_>, SpellError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SpellError::Unavailable {
                checker: CHECKER_NAME.into(),
                reason: e.to_string(),
            })?;
        debug!(url = %self.base_url, "LanguageTool session opened");
        Ok(Box::new(LanguageToolSession {
            checker: self,
            client,
        }))
    }
}

struct LanguageToolSession<'a> {
    checker: &'a LanguageToolChecker,
    client: reqwest::blocking::Client,
}

impl SpellSession for LanguageToolSession<'_> {
    fn check(&mut self, text: &str) -> Result<Vec<SpellFinding>, SpellError> {
        let resp = self
            .client
            .post(self.checker.check_url())
            .form(&[("text", text), ("language", self.checker.language.as_str())])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SpellError::Timeout {
                        checker: CHECKER_NAME.into(),
                        timeout: self.checker.timeout,
                    }
                } else {
                    SpellError::RequestFailed {
                        checker: CHECKER_NAME.into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(SpellError::RequestFailed {
                checker: CHECKER_NAME.into(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: CheckResponse = resp.json().map_err(|e| SpellError::InvalidResponse {
            checker: CHECKER_NAME.into(),
            reason: e.to_string(),
        })?;

        Ok(parsed.into_findings(text))
    }
}

impl Drop for LanguageToolSession<'_> {
    fn drop(&mut self) {
        debug!(url = %self.checker.base_url, "LanguageTool session released");
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    matches: Vec<CheckMatch>,
}

#[derive(Debug, Deserialize)]
struct CheckMatch {
    offset: usize,
    length: usize,
    #[serde(default)]
    replacements: Vec<Replacement>,
    rule: MatchRule,
}

#[derive(Debug, Deserialize)]
struct Replacement {
    value: String,
}

#[derive(Debug, Deserialize)]
struct MatchRule {
    id: String,
}

impl CheckResponse {
    /// Offsets are in characters of the submitted text.
    fn into_findings(self, text: &str) -> Vec<SpellFinding> {
        self.matches
            .into_iter()
            .map(|m| SpellFinding {
                word: text.chars().skip(m.offset).take(m.length).collect(),
                suggestion: m.replacements.into_iter().next().map(|r| r.value),
                rule_id: m.rule.id,
            })
            .collect()
    }
}
