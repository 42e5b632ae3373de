//! Structural code (`X.Y.Z`) extraction and cross-checking.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Status, StructuralCode};
use crate::reference::contingency::OTHER_CAUSES_CODE;

/// `X.Y.Z` with `.` or `-` separators, delimited by whitespace, parentheses,
/// hyphens or the text boundaries.
static CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(\-])(\d{1,2})[.\-](\d{1,2})[.\-]([A-Z])(?:[\s)\-]|$)")
        .expect("structural code regex must compile")
});

/// Extract the first structural code from normalized text.
pub fn extract_code(text: &str) -> Option<StructuralCode> {
    let caps = CODE.captures(text.trim())?;
    let x = caps.get(1)?.as_str();
    let y = caps.get(2)?.as_str();
    let stage = caps.get(3)?.as_str().chars().next()?;

    Some(StructuralCode {
        literal: format!("{x}.{y}.{stage}"),
        cause: format!("{x:0>2}"),
        status: y.to_string(),
        stage,
    })
}

/// Cross-check a code against the independently detected cause and status.
///
/// Returns human-readable observations. Never blocking: the generic code is a
/// legitimate curator choice.
pub fn validate_code(
    code: &StructuralCode,
    cause: Option<&str>,
    status: Option<Status>,
) -> Vec<String> {
    let mut observations = Vec::new();

    match cause {
        None if code.cause == OTHER_CAUSES_CODE => {}
        None => observations.push(format!(
            "Code inconsistency: code uses cause {} but no cause was detected in the text",
            code.cause
        )),
        Some(detected) if detected != code.cause => observations.push(format!(
            "Code inconsistency: code uses cause {} but the stated cause corresponds to {}",
            code.cause, detected
        )),
        Some(_) => {}
    }

    if let (Some(expected), Some(detected)) = (Status::from_code(&code.status), status)
        && !status_compatible(expected, detected)
    {
        observations.push(format!(
            "Status inconsistency: code indicates {} but the message describes {}",
            expected.label(),
            detected.label()
        ));
    }

    observations
}

/// Suspension is the 2B sibling of cancellation and shares Y=2.
fn status_compatible(expected: Status, detected: Status) -> bool {
    expected == detected || (expected == Status::Cancellation && detected == Status::Suspension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_code() {
        let code = extract_code("POR PROBLEMAS TÉCNICOS 03.1.A").unwrap();
        assert_eq!(code.literal, "03.1.A");
        assert_eq!(code.cause, "03");
        assert_eq!(code.status, "1");
        assert_eq!(code.stage, 'A');
    }

    #[test]
    fn pads_single_digit_cause_and_accepts_hyphens() {
        let code = extract_code("3-2-B EL TREN 10 HA SIDO CANCELADO").unwrap();
        assert_eq!(code.literal, "3.2.B");
        assert_eq!(code.cause, "03");
    }

    #[test]
    fn code_inside_parentheses() {
        let code = extract_code("EL TREN 10 HA SIDO CANCELADO (17.2.A)").unwrap();
        assert_eq!(code.cause, "17");
    }

    #[test]
    fn times_are_not_codes() {
        assert!(extract_code("DE LAS 10.30 HS").is_none());
        assert!(extract_code("KM 12.5.AB").is_none());
    }

    #[test]
    fn other_causes_code_without_cause_is_accepted() {
        let code = extract_code("HA SIDO CANCELADO 17.2.A").unwrap();
        assert!(validate_code(&code, None, Some(Status::Cancellation)).is_empty());
    }

    #[test]
    fn cause_mismatch_is_observation() {
        let code = extract_code("HA SIDO CANCELADO 03.2.A").unwrap();
        let obs = validate_code(&code, Some("05"), Some(Status::Cancellation));
        assert_eq!(obs.len(), 1);
        assert!(obs[0].contains("05"));
    }

    #[test]
    fn status_mismatch_is_observation() {
        let code = extract_code("03.1.A").unwrap();
        let obs = validate_code(&code, Some("03"), Some(Status::Cancellation));
        assert_eq!(obs.len(), 1);
        assert!(obs[0].contains("DEMORA"));
    }

    #[test]
    fn suspension_shares_cancellation_code() {
        let code = extract_code("03.2.A").unwrap();
        assert!(validate_code(&code, Some("03"), Some(Status::Suspension)).is_empty());
    }
}
