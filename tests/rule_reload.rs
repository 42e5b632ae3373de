//! Reference data on disk: explicit reload of override rules and the
//! contingency table.

use std::path::Path;
use std::sync::Arc;

use railcheck::config::EngineConfig;
use railcheck::error::{Error, SpellError};
use railcheck::reference::{OverrideAction, ReferenceRegistry};
use railcheck::validation::{
    Message, OrthographyChecker, SpellChecker, SpellSession, Validator, Verdict,
};

const NO_TIME: &str = "EL TREN 2040 CIRCULA CON DEMORAS DE 10 MINUTOS DESDE ONCE HACIA MORENO POR PROBLEMAS TÉCNICOS 03.1.A";

fn config(root: &Path) -> EngineConfig {
    let table = root.join("contingencias.json");
    std::fs::write(
        &table,
        r#"[
            {"Código": "03", "Forma Comunicación": "PROBLEMAS TÉCNICOS"},
            {"Código": "17", "Forma Comunicación": "OTRAS CONTINGENCIAS"}
        ]"#,
    )
    .unwrap();

    EngineConfig {
        contingency_table: table,
        rules_dir: root.join("reglas"),
        line_configs_dir: root.to_path_buf(),
        default_line: "sarmiento".into(),
        ..EngineConfig::default()
    }
}

fn write_rules(root: &Path, scope: &str, body: &str) {
    let dir = root.join("reglas").join(scope);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("personalizadas.json"), body).unwrap();
}

/// External checker whose server never answers.
struct Unreachable;

impl SpellChecker for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    fn open(&self) -> Result<Box<dyn SpellSession + '_>, SpellError> {
        Err(SpellError::Unavailable {
            checker: "unreachable".into(),
            reason: "connection refused".into(),
        })
    }
}

fn message(content: &str) -> Message {
    Message {
        id: "77".into(),
        content: content.into(),
        line: "Sarmiento".into(),
        operator: "mgomez".into(),
        sent_at: "20/05/2025 08:15:00".into(),
    }
}

#[test]
fn new_rules_apply_only_after_reload() {
    let root = tempfile::tempdir().unwrap();
    let validator = Validator::from_config(&config(root.path()));

    let before = validator.validate(&message(NO_TIME));
    assert_eq!(before.verdict, Verdict::Blocking);
    assert!(before.applied_override.is_none());

    write_rules(
        root.path(),
        "sarmiento",
        r#"{"reglas": [{"id": 5, "patron_detectado": "Demoras sin horario en Once", "regex_sugerido": "DESDE ONCE", "accion_sugerida": "aprobar_con_obs"}]}"#,
    );

    // cached rules stay in force until reloaded
    assert_eq!(validator.validate(&message(NO_TIME)).verdict, Verdict::Blocking);

    validator.reload().unwrap();
    let after = validator.validate(&message(NO_TIME));
    assert_eq!(after.verdict, Verdict::Advisory);
    assert!(after.requires_notification);
    assert!(!after.issues.blocking.is_empty());
    assert_eq!(
        after.applied_override.unwrap().action,
        OverrideAction::ForceAdvisory
    );
}

#[test]
fn global_rules_win_over_line_rules() {
    let root = tempfile::tempdir().unwrap();
    write_rules(
        root.path(),
        "sarmiento",
        r#"{"reglas": [{"id": "line", "regex_sugerido": "TREN 2040", "accion_sugerida": "aprobar_sin_obs"}]}"#,
    );
    write_rules(
        root.path(),
        "globales",
        r#"{"reglas": [{"id": "global", "regex_sugerido": "MORENO", "accion_sugerida": "rechazar"}]}"#,
    );

    let validator = Validator::from_config(&config(root.path()));
    let report = validator.validate(&message(NO_TIME));
    assert_eq!(report.verdict, Verdict::Blocking);
    assert_eq!(report.applied_override.unwrap().rule_id, "global");
}

#[test]
fn malformed_rule_is_skipped_and_others_still_apply() {
    let root = tempfile::tempdir().unwrap();
    write_rules(
        root.path(),
        "global",
        r#"{"reglas": [
            {"id": 1, "regex_sugerido": "(?<=ONCE)", "accion_sugerida": "rechazar"},
            {"id": 2, "regex_sugerido": "ONCE", "accion_sugerida": "aprobar_sin_obs"}
        ]}"#,
    );

    let validator = Validator::from_config(&config(root.path()));
    let rules = validator.registry().rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules.skipped().len(), 1);

    let report = validator.validate(&message(NO_TIME));
    assert_eq!(report.verdict, Verdict::Clean);
    assert_eq!(report.applied_override.unwrap().rule_id, "2");
}

#[test]
fn reapply_after_rule_change() {
    let root = tempfile::tempdir().unwrap();
    let validator = Validator::from_config(&config(root.path()));
    let mut reports = vec![
        validator.validate(&message(NO_TIME)),
        validator.validate(&message(&NO_TIME.replace("ONCE", "CASTELAR"))),
    ];

    write_rules(
        root.path(),
        "sarmiento",
        r#"{"reglas": [{"id": 9, "regex_sugerido": "DESDE ONCE", "accion_sugerida": "aprobar_sin_obs"}]}"#,
    );
    validator.registry().reload_rules().unwrap();

    assert_eq!(validator.reapply_overrides(&mut reports), 1);
    assert_eq!(reports[0].verdict, Verdict::Clean);
    assert_eq!(reports[1].verdict, Verdict::Blocking);
}

#[test]
fn contingency_table_reload_adds_causes() {
    let root = tempfile::tempdir().unwrap();
    let cfg = config(root.path());
    let validator = Validator::from_config(&cfg);
    let text = "EL TREN 2040 DE LAS 08:00 HS DESDE ONCE HACIA MORENO HA SIDO CANCELADO POR VANDALISMO 08.2.A";

    let before = validator.validate(&message(text));
    assert!(before.components.cause.is_none());

    std::fs::write(
        &cfg.contingency_table,
        r#"[
            {"Código": "03", "Forma Comunicación": "PROBLEMAS TÉCNICOS"},
            {"Código": "08", "Forma Comunicación": "VANDALISMO"},
            {"Código": "17", "Forma Comunicación": "OTRAS CONTINGENCIAS"}
        ]"#,
    )
    .unwrap();
    validator.reload().unwrap();

    let after = validator.validate(&message(text));
    assert_eq!(after.components.cause_code(), Some("08"));
    assert!(after.issues.blocking.is_empty(), "{:?}", after.issues);
}

#[test]
fn unreadable_contingency_table_degrades() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = config(root.path());
    cfg.contingency_table = root.path().join("missing.json");

    let validator = Validator::from_config(&cfg);
    let report = validator.validate(&message(NO_TIME));
    assert!(report.components.cause.is_none());
    assert!(
        report
            .issues
            .blocking
            .contains(&"missing contingency cause".to_string())
    );
}

#[test]
fn rules_reload_while_contingency_table_is_unavailable() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = config(root.path());
    cfg.contingency_table = root.path().join("missing.json");

    let validator = Validator::new(
        Arc::new(ReferenceRegistry::from_config(&cfg)),
        OrthographyChecker::with_external(Box::new(Unreachable)),
    );
    assert_eq!(validator.validate(&message(NO_TIME)).verdict, Verdict::Blocking);
    assert!(!validator.spelling().external_active());

    write_rules(
        root.path(),
        "sarmiento",
        r#"{"reglas": [{"id": 12, "regex_sugerido": "DESDE ONCE", "accion_sugerida": "aprobar_sin_obs"}]}"#,
    );

    let err = validator.reload().unwrap_err();
    assert!(matches!(err, Error::Reference(_)), "{err}");
    assert!(validator.spelling().external_active());

    let report = validator.validate(&message(NO_TIME));
    assert_eq!(report.verdict, Verdict::Clean);
    assert_eq!(report.applied_override.unwrap().rule_id, "12");
}
