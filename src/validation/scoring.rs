//! Scorer: issue taxonomy and quality scores.
//!
//! The verdict comes from the issue buckets alone; the three scores are
//! diagnostic.

use super::normalize::fold_accents;
use super::structure::validate_code;
use super::types::{
    ComponentSet, CompletenessGrade, FormGrade, IssueBuckets, MessageType, QualityScores,
    RouteSlot, Score, Status, TimelinessGrade, TimingBucket, TimingResult,
};
use crate::reference::contingency::OTHER_CAUSES_CODE;

pub const MISSING_TRAIN_NUMBER: &str = "missing train number";
pub const MISSING_STATUS: &str = "missing service status";
pub const MISSING_DELAY_MINUTES: &str = "missing delay minutes";
pub const MISSING_SCHEDULED_TIME: &str = "missing scheduled time";
pub const MISSING_ROUTE: &str = "missing origin and destination";
pub const MISSING_ORIGIN: &str = "missing origin station";
pub const MISSING_DESTINATION: &str = "missing destination station";
pub const MISSING_SERVICE: &str = "missing service identification";
pub const MISSING_CAUSE: &str = "missing contingency cause";
pub const MISSING_CODE: &str = "missing structural code (e.g. 3.1.A)";

/// Critical sends later than this many minutes get a late-notification advisory.
const LATE_NOTICE_MINUTES: f64 = 15.0;

/// Causes (accidents, works) whose general-service notices should name a place.
const LOCATION_CAUSES: &[&str] = &["01", "02", "11", "12"];

// ── Issues ──────────────────────────────────────────────────────────

/// Build the three issue buckets for one message.
pub fn classify_issues(
    components: &ComponentSet,
    timing: Option<&TimingResult>,
    content: &str,
) -> IssueBuckets {
    let mut issues = IssueBuckets::default();

    match components.message_type {
        MessageType::SpecificTrain => train_issues(components, &mut issues),
        MessageType::GeneralService => general_issues(components, &mut issues),
        MessageType::Restoration | MessageType::Unknown => {}
    }

    cause_issues(components, content, &mut issues);
    code_issues(components, &mut issues);

    for issue in &components.spelling_issues {
        issues.advisory.push(format!("Orthography: {issue}"));
    }
    for advice in &components.format_advisories {
        issues.cosmetic.push(format!("Format: {advice}"));
    }

    if let Some(t) = timing
        && t.bucket == TimingBucket::Critical
        && t.lateness_minutes > LATE_NOTICE_MINUTES
    {
        issues.advisory.push(format!(
            "Late notification: sent {:.0} minutes after {}",
            t.lateness_minutes, t.reference
        ));
    }

    issues
}

fn train_issues(c: &ComponentSet, issues: &mut IssueBuckets) {
    if c.identity.is_none() {
        issues.blocking.push(MISSING_TRAIN_NUMBER.into());
    }

    match &c.status {
        None => issues.blocking.push(MISSING_STATUS.into()),
        Some(status) => {
            if !status.formal {
                issues.cosmetic.push(informal_status(
                    status.status.label(),
                    "'CIRCULA CON DEMORAS DE X MINUTOS' or 'HA SIDO CANCELADO'",
                ));
            }
            if status.status == Status::Delay && status.minutes.is_none() {
                if status.departure_delay {
                    issues.advisory.push(
                        "Departure delay without minutes; add an estimate if one is known".into(),
                    );
                } else {
                    issues.blocking.push(MISSING_DELAY_MINUTES.into());
                }
            }
        }
    }

    if c.scheduled_time().is_none() {
        issues.blocking.push(MISSING_SCHEDULED_TIME.into());
    }

    match &c.route {
        Some(RouteSlot::Route {
            origin,
            destination,
        }) => {
            if origin.is_none() {
                issues.blocking.push(MISSING_ORIGIN.into());
            }
            if destination.is_none() {
                issues.blocking.push(MISSING_DESTINATION.into());
            }
        }
        Some(RouteSlot::Apology) | None => issues.blocking.push(MISSING_ROUTE.into()),
    }
}

fn general_issues(c: &ComponentSet, issues: &mut IssueBuckets) {
    match &c.identity {
        None => issues.blocking.push(MISSING_SERVICE.into()),
        Some(name) if name.contains('-') => issues.cosmetic.push(format!(
            "Hyphens in '{name}' are accepted, but prefer the official branch name"
        )),
        Some(_) => {}
    }

    match &c.status {
        None => issues.blocking.push(MISSING_STATUS.into()),
        Some(status) if !status.formal => issues.cosmetic.push(informal_status(
            status.status.label(),
            "'EL SERVICIO SE ENCUENTRA INTERRUMPIDO' or 'CIRCULA REDUCIDO'",
        )),
        Some(_) => {}
    }

    if c.schedule.is_none()
        && c.cause_code().is_some_and(|code| LOCATION_CAUSES.contains(&code))
    {
        issues
            .cosmetic
            .push("Consider naming the location (e.g. 'EN LAFERRERE')".into());
    }
}

fn informal_status(label: &str, example: &str) -> String {
    format!("The message mentions '{label}' without the formal structure; e.g. {example}")
}

fn cause_issues(c: &ComponentSet, content: &str, issues: &mut IssueBuckets) {
    if c.cause.is_some() {
        return;
    }
    let cancellation_like = c.status_kind().is_some_and(|s| s.is_cancellation_like());
    let generic_code = c.code.as_ref().is_some_and(|code| code.cause == OTHER_CAUSES_CODE);

    if cancellation_like && generic_code {
        issues.advisory.push(
            "Code 17 without a detailed cause; use the specific code if a cause is known".into(),
        );
    } else if fold_accents(content).contains("FORMACION") {
        issues.cosmetic.push(
            "Rolling-stock notice without a specific cause; add it if there is a technical reason"
                .into(),
        );
    } else {
        issues.blocking.push(MISSING_CAUSE.into());
    }
}

fn code_issues(c: &ComponentSet, issues: &mut IssueBuckets) {
    if !c.structure_valid {
        issues.blocking.push(MISSING_CODE.into());
        return;
    }
    let Some(code) = &c.code else { return };

    if c.cause.is_some() {
        issues
            .advisory
            .extend(validate_code(code, c.cause_code(), c.status_kind()));
    }
    if code.cause == OTHER_CAUSES_CODE {
        issues.advisory.push(
            "Code 17 (other causes) is exceptional; check whether a more specific code applies"
                .into(),
        );
    }
}

// ── Scores ──────────────────────────────────────────────────────────

/// Compute the three diagnostic scores.
pub fn score(
    components: &ComponentSet,
    timing: Option<&TimingResult>,
    content: &str,
) -> QualityScores {
    QualityScores {
        completeness: completeness(components),
        timeliness: timeliness(timing),
        form: form(components, content),
    }
}

fn completeness(c: &ComponentSet) -> Score<CompletenessGrade> {
    let kind = c.message_type;
    let general = kind == MessageType::GeneralService;
    let restoration = kind == MessageType::Restoration;

    let mut points = 0u8;
    let mut notes = Vec::new();
    let mut credit = |present: bool, weight: u8, note: &str| {
        if present {
            points += weight;
        } else {
            notes.push(note.to_string());
        }
    };

    credit(
        c.identity.is_some() || restoration,
        20,
        if general {
            MISSING_SERVICE
        } else {
            MISSING_TRAIN_NUMBER
        },
    );
    credit(c.status.is_some(), 20, MISSING_STATUS);
    credit(c.cause.is_some(), 15, MISSING_CAUSE);
    credit(
        c.schedule.is_some() || general || restoration,
        15,
        MISSING_SCHEDULED_TIME,
    );
    credit(
        c.route.as_ref().is_some_and(RouteSlot::is_complete) || general || restoration,
        20,
        MISSING_ROUTE,
    );
    credit(c.structure_valid, 10, MISSING_CODE);

    let grade = match points {
        90.. => CompletenessGrade::Complete,
        70.. => CompletenessGrade::Acceptable,
        _ => CompletenessGrade::Incomplete,
    };
    Score {
        points: Some(points),
        grade,
        notes,
    }
}

fn timeliness(timing: Option<&TimingResult>) -> Score<TimelinessGrade> {
    let Some(t) = timing else {
        return Score {
            points: None,
            grade: TimelinessGrade::NotApplicable,
            notes: vec!["Timing not computable".into()],
        };
    };

    let (points, grade) = match t.bucket {
        TimingBucket::Excellent | TimingBucket::VeryGood | TimingBucket::OnTime => {
            (100, TimelinessGrade::Excellent)
        }
        TimingBucket::Acceptable => (60, TimelinessGrade::Good),
        TimingBucket::Critical => (20, TimelinessGrade::Deficient),
    };
    let note = if t.lateness_minutes < 0.0 {
        format!("Sent {:.0} min before {}", t.lateness_minutes.abs(), t.reference)
    } else {
        format!("Sent {:.0} min after {}", t.lateness_minutes, t.reference)
    };

    Score {
        points: Some(points),
        grade,
        notes: vec![note],
    }
}

fn form(c: &ComponentSet, content: &str) -> Score<FormGrade> {
    let mut points = 0u8;
    let mut notes = Vec::new();

    let errors = &c.spelling_issues;
    points += match errors.len() {
        0 => 40,
        1 => 25,
        2..=3 => 15,
        4..=5 => 10,
        _ => 0,
    };
    match errors.len() {
        0 => {}
        1..=3 => notes.extend(errors.iter().map(|e| format!("Orthography: {e}"))),
        n @ 4..=5 => notes.push(format!(
            "{n} spelling errors: {}...",
            errors[..3].join(", ")
        )),
        n => notes.push(format!("{n} serious spelling errors")),
    }

    if c.structure_valid {
        points += 30;
    } else {
        points += 10;
        notes.push("Incorrect format".into());
    }

    let length = content.trim().chars().count();
    if length > 50 {
        points += 30;
    } else if length > 30 {
        points += 20;
        notes.push("Wording could be clearer".into());
    } else {
        points += 10;
        notes.push("Message too short or unclear".into());
    }

    let grade = match points {
        95.. => FormGrade::Impeccable,
        75.. => FormGrade::Correct,
        55.. => FormGrade::Improvable,
        _ => FormGrade::Deficient,
    };
    Score {
        points: Some(points),
        grade,
        notes,
    }
}
