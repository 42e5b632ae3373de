//! The per-message validation pipeline.
//!
//! normalize → extract → spelling → timing → score → verdict → overlay.
//! Reference data is read once per message from a registry snapshot, so a
//! concurrent reload never mixes old and new rules within one report.
//!
//! `validate` may block on the external spell checker. Async callers go
//! through `tokio::task::spawn_blocking` (see [`crate::batch`]).

use std::sync::Arc;

use tracing::{debug, info};

use super::extract::extract;
use super::languagetool::LanguageToolChecker;
use super::normalize::normalize;
use super::scoring;
use super::spelling::OrthographyChecker;
use super::timing;
use super::types::{Message, ValidationReport};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::reference::registry::{ReferenceRegistry, ReferenceSnapshot};

/// Validates operator messages against the current reference data.
pub struct Validator {
    registry: Arc<ReferenceRegistry>,
    spelling: OrthographyChecker,
}

impl Validator {
    pub fn new(registry: Arc<ReferenceRegistry>, spelling: OrthographyChecker) -> Self {
        Self { registry, spelling }
    }

    /// Load reference data from the configured paths and attach the
    /// LanguageTool checker when a URL is configured.
    pub fn from_config(config: &EngineConfig) -> Self {
        let registry = Arc::new(ReferenceRegistry::from_config(config));
        let spelling = match &config.languagetool_url {
            Some(url) => {
                info!(url = %url, "External spell checker enabled");
                OrthographyChecker::with_external(Box::new(LanguageToolChecker::new(
                    url.as_str(),
                    config.languagetool_language.as_str(),
                    config.spell_timeout,
                )))
            }
            None => OrthographyChecker::fallback_only(),
        };
        Self::new(registry, spelling)
    }

    pub fn registry(&self) -> &Arc<ReferenceRegistry> {
        &self.registry
    }

    pub fn spelling(&self) -> &OrthographyChecker {
        &self.spelling
    }

    /// Validate one message. Never fails: missing components become issues
    /// and unavailable collaborators degrade.
    pub fn validate(&self, message: &Message) -> ValidationReport {
        let snapshot = self.registry.snapshot();
        self.validate_with(message, &snapshot)
    }

    fn validate_with(&self, message: &Message, snapshot: &ReferenceSnapshot) -> ValidationReport {
        let normalized = normalize(&message.content);
        let mut components = extract(&normalized, &snapshot.contingencies);

        let allowlist = snapshot.terms.for_line(&message.line);
        let spelling = self
            .spelling
            .check(&message.content, &normalized, &allowlist);
        components.spelling_issues = spelling.issues;
        components.checker_notice = spelling.notice;

        let timing = timing::evaluate(&components, &message.sent_at);
        let issues = scoring::classify_issues(&components, timing.as_ref(), &normalized);
        let scores = scoring::score(&components, timing.as_ref(), &normalized);
        let verdict = issues.verdict();

        let mut report = ValidationReport {
            id: message.id.clone(),
            line: message.line.clone(),
            operator: message.operator.clone(),
            sent_at: message.sent_at.clone(),
            content: message.content.clone(),
            components,
            issues,
            verdict,
            timing,
            scores,
            requires_notification: verdict.requires_notification(),
            applied_override: None,
        };
        snapshot.rules.apply(&mut report);

        debug!(
            id = %report.id,
            kind = ?report.components.message_type,
            verdict = ?report.verdict,
            "Message validated"
        );
        report
    }

    /// Re-apply the current override rules to stored reports. Returns how
    /// many verdicts changed.
    ///
    /// Reports an earlier rule decided are validated again from their stored
    /// fields, since the overlay may have discarded the computed issues.
    pub fn reapply_overrides(&self, reports: &mut [ValidationReport]) -> usize {
        let snapshot = self.registry.snapshot();
        let mut changed = 0;

        for report in reports.iter_mut() {
            let before = report.verdict;
            if report.applied_override.is_some() {
                let message = Message {
                    id: report.id.clone(),
                    content: report.content.clone(),
                    line: report.line.clone(),
                    operator: report.operator.clone(),
                    sent_at: report.sent_at.clone(),
                };
                *report = self.validate_with(&message, &snapshot);
            } else {
                snapshot.rules.apply(report);
            }
            if report.verdict != before {
                changed += 1;
            }
        }

        info!(reports = reports.len(), changed, "Override rules re-applied");
        changed
    }

    /// Reload reference data and give a failed external checker another try.
    /// Sources that reload are in force even when the result is an error.
    pub fn reload(&self) -> Result<()> {
        let reloaded = self.registry.reload();
        self.spelling.retry_external();
        reloaded
    }
}
