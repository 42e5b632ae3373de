//! Process-wide reference data with explicit reload.
//!
//! The table, allowlists and rules live in one `Arc<ReferenceSnapshot>`.
//! Reloads build the replacement parts off-lock and swap the snapshot once,
//! so a validation never observes a table from one reload next to rules from
//! another.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, info, warn};

use super::contingency::ContingencyTable;
use super::rules::{DirectoryRuleSource, RuleSet, RuleSource};
use super::terms::TermCatalog;
use crate::config::EngineConfig;
use crate::error::{Error, Result, RuleError};

/// Consistent view of all reference data for one validation.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    pub contingencies: Arc<ContingencyTable>,
    pub terms: Arc<TermCatalog>,
    pub rules: Arc<RuleSet>,
}

struct Current {
    snapshot: Arc<ReferenceSnapshot>,
    /// Rules in `snapshot` are a placeholder until first use or after
    /// invalidation.
    rules_stale: bool,
}

/// Owns the contingency table, term allowlists and override rules.
pub struct ReferenceRegistry {
    contingency_path: Option<PathBuf>,
    line_configs_dir: Option<PathBuf>,
    default_line: String,
    rule_source: Box<dyn RuleSource>,
    current: RwLock<Current>,
}

impl ReferenceRegistry {
    /// Load reference data from the configured paths. An unreadable
    /// contingency table degrades to an empty one; rules load on first use.
    pub fn from_config(config: &EngineConfig) -> Self {
        let contingencies = ContingencyTable::load(&config.contingency_table).unwrap_or_else(|e| {
            error!(error = %e, "Contingency table unavailable, cause matching disabled");
            ContingencyTable::empty()
        });
        let terms = TermCatalog::load_dir(&config.line_configs_dir, &config.default_line);

        info!(
            contingencies = contingencies.len(),
            term_lines = terms.lines(),
            "Reference data loaded"
        );

        Self {
            contingency_path: Some(config.contingency_table.clone()),
            line_configs_dir: Some(config.line_configs_dir.clone()),
            default_line: config.default_line.clone(),
            rule_source: Box::new(DirectoryRuleSource::new(config.rules_dir.clone())),
            current: RwLock::new(Current::unloaded(contingencies, terms)),
        }
    }

    /// Registry over in-memory data. `reload` only re-reads the rule source.
    pub fn from_parts(
        contingencies: ContingencyTable,
        terms: TermCatalog,
        rule_source: Box<dyn RuleSource>,
    ) -> Self {
        Self {
            contingency_path: None,
            line_configs_dir: None,
            default_line: String::new(),
            rule_source,
            current: RwLock::new(Current::unloaded(contingencies, terms)),
        }
    }

    pub fn contingencies(&self) -> Arc<ContingencyTable> {
        Arc::clone(&self.read().snapshot.contingencies)
    }

    pub fn terms(&self) -> Arc<TermCatalog> {
        Arc::clone(&self.read().snapshot.terms)
    }

    /// Current rule set, loading it if the cache is stale. A failing source
    /// caches an empty set until the next explicit reload.
    pub fn rules(&self) -> Arc<RuleSet> {
        Arc::clone(&self.snapshot().rules)
    }

    /// Table, allowlists and rules as of the same swap.
    pub fn snapshot(&self) -> ReferenceSnapshot {
        {
            let current = self.read();
            if !current.rules_stale {
                return ReferenceSnapshot::clone(&current.snapshot);
            }
        }

        let mut current = self.write();
        if current.rules_stale {
            let rules = self.rule_source.load().unwrap_or_else(|e| {
                error!(source = %self.rule_source.name(), error = %e, "Override rules unavailable");
                RuleSet::default()
            });
            current.replace(None, None, Some(Arc::new(rules)));
        }
        ReferenceSnapshot::clone(&current.snapshot)
    }

    /// Mark the cached rules stale; the next reader reloads them.
    pub fn invalidate_rules(&self) {
        self.write().rules_stale = true;
        info!("Override rule cache invalidated");
    }

    /// Re-read the rule source and swap it in before returning. On failure
    /// the previous rules stay in place.
    pub fn reload_rules(&self) -> std::result::Result<Arc<RuleSet>, RuleError> {
        let fresh = Arc::new(self.rule_source.load()?);
        self.write().replace(None, None, Some(Arc::clone(&fresh)));
        info!(
            rules = fresh.len(),
            skipped = fresh.skipped().len(),
            "Override rules reloaded"
        );
        Ok(fresh)
    }

    /// Reload everything backed by files. Each source reloads on its own: a
    /// failing one keeps its previous data and the rest are still swapped
    /// in. Failures are returned together once the swap is done.
    pub fn reload(&self) -> Result<()> {
        let mut failures = Vec::new();

        let contingencies = self.contingency_path.as_ref().and_then(|path| {
            match ContingencyTable::load(path) {
                Ok(table) => Some(Arc::new(table)),
                Err(e) => {
                    warn!(error = %e, "Contingency table reload failed, keeping previous table");
                    failures.push(Error::from(e));
                    None
                }
            }
        });
        let terms = self
            .line_configs_dir
            .as_ref()
            .map(|dir| Arc::new(TermCatalog::load_dir(dir, &self.default_line)));
        let rules = match self.rule_source.load() {
            Ok(rules) => Some(Arc::new(rules)),
            Err(e) => {
                warn!(source = %self.rule_source.name(), error = %e, "Override rule reload failed, keeping previous rules");
                failures.push(Error::from(e));
                None
            }
        };

        let snapshot = {
            let mut current = self.write();
            current.replace(contingencies, terms, rules);
            Arc::clone(&current.snapshot)
        };
        info!(
            contingencies = snapshot.contingencies.len(),
            term_lines = snapshot.terms.lines(),
            rules = snapshot.rules.len(),
            failures = failures.len(),
            "Reference data reloaded"
        );

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Error::Reload(failures)),
        }
    }

    /// Replace the contingency table (used by tests and embedding callers).
    pub fn set_contingencies(&self, table: ContingencyTable) {
        self.write().replace(Some(Arc::new(table)), None, None);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Current> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Current> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Current {
    fn unloaded(contingencies: ContingencyTable, terms: TermCatalog) -> Self {
        Self {
            snapshot: Arc::new(ReferenceSnapshot {
                contingencies: Arc::new(contingencies),
                terms: Arc::new(terms),
                rules: Arc::new(RuleSet::default()),
            }),
            rules_stale: true,
        }
    }

    /// Swap in a new snapshot, keeping the parts passed as `None`.
    fn replace(
        &mut self,
        contingencies: Option<Arc<ContingencyTable>>,
        terms: Option<Arc<TermCatalog>>,
        rules: Option<Arc<RuleSet>>,
    ) {
        if rules.is_some() {
            self.rules_stale = false;
        }
        let old = &self.snapshot;
        let next = ReferenceSnapshot {
            contingencies: contingencies.unwrap_or_else(|| Arc::clone(&old.contingencies)),
            terms: terms.unwrap_or_else(|| Arc::clone(&old.terms)),
            rules: rules.unwrap_or_else(|| Arc::clone(&old.rules)),
        };
        self.snapshot = Arc::new(next);
    }
}
