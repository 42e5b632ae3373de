//! Component extractor: slots A–F from normalized text.
//!
//! Slots that are not found stay `None`. Informal phrasings that are still
//! understood fill the slot and add a format advisory.

use std::sync::LazyLock;

use regex::Regex;

use super::classify::classify;
use super::matcher::group;
use super::status::detect_status;
use super::structure::extract_code;
use super::types::{ComponentSet, MessageType, RouteSlot, ScheduleSlot};
use crate::reference::contingency::ContingencyTable;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!(stringify!($name), " must compile")));
    };
}

pattern!(FORMAL_TIME, r"DE\s+LAS\s*(\d{1,2})([:.\s])(\d{2})\s*HS");
pattern!(
    LOOSE_TIME,
    r"(?:A\s+LAS|DE\s+LAS|\bDE|SALIDA|HORA)\s*(\d{1,2})[:.\s](\d{2})"
);

pattern!(
    ORIGIN,
    r"\b(?:PARTIENDO\s+(?:DE|DESDE)|DESDE|DE)\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.()]+?)\s+(?:HACIA|A\s+[A-ZÁÉÍÓÚÑ]|CON\s+DEMORA|CIRCULA|HA\s+SIDO|FUE)"
);
pattern!(
    DESTINATION,
    r"\bHACIA\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.()]+?)(?:\s+(?:CIRCULA|HA\s+SIDO|FUE|CON\s+DEMORA|REGISTRA|SE\s+ENCUENTRA|POR\s|O\s+TRAS\s|RESTABLECE|SE\s|\(?\d)|$)"
);
pattern!(
    BETWEEN,
    r"\bENTRE\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.()]+?)\s+Y\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.()]+?)(?:\s+(?:CIRCULA|HA\s+SIDO|FUE|CON\s+DEMORA|POR\s|\(?\d)|$)"
);
pattern!(
    FROM_TO,
    r"\bDE\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.()]+?)\s+A\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.()]+?)(?:\s+(?:CIRCULA|HA\s+SIDO|FUE|CON\s+DEMORA|POR\s|\(?\d)|$)"
);

pattern!(
    LOCATION,
    r"\bEN\s+([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s.]*?)(?:\s+(?:DISCULPA|DISCULPE|SEPA|POR\s)|\s*\.|$)"
);
pattern!(APOLOGY, r"\bDISCULP[AE]");

/// Time-of-day phrases that follow `EN` but are not places.
const NOT_LOCATIONS: &[&str] = &[
    "EL DIA",
    "EL DÍA",
    "LA MAÑANA",
    "LA TARDE",
    "LA NOCHE",
    "EL TRANSCURSO",
];

pub const ADVICE_TIME_SEPARATOR: &str = "Separate hours and minutes with ':' ('DE LAS HH:MM HS')";
pub const ADVICE_TIME_FORM: &str = "Use 'DE LAS HH:MM HS' for the scheduled time";
pub const ADVICE_ROUTE_BETWEEN: &str = "Use 'DESDE <origin> HACIA <destination>' for the route";
pub const ADVICE_ROUTE_TO: &str = "Use 'HACIA <station>' instead of 'A' for the destination";
pub const ADVICE_UNKNOWN_FORMAT: &str =
    "Structural code found but the message has no recognized format (train or general service)";

/// Extract every slot except spelling from normalized text.
pub fn extract(normalized: &str, contingencies: &ContingencyTable) -> ComponentSet {
    let upper = normalized.to_uppercase();
    let classification = classify(&upper);
    let mut set = ComponentSet::empty(classification.message_type);

    set.identity = classification.identity;
    set.status = detect_status(&upper);
    set.cause = contingencies.resolve(&upper);

    set.code = extract_code(normalized);
    if set.code.is_some() {
        if set.message_type == MessageType::Unknown {
            set.format_advisories.push(ADVICE_UNKNOWN_FORMAT.to_string());
        } else {
            set.structure_valid = true;
        }
    }

    match set.message_type {
        MessageType::SpecificTrain => {
            set.schedule = scheduled_time(&upper, &mut set.format_advisories);
            set.route = train_route(&upper, &mut set.format_advisories);
        }
        MessageType::GeneralService => {
            set.schedule = location(&upper).map(ScheduleSlot::Location);
            if APOLOGY.is_match(&upper) {
                set.route = Some(RouteSlot::Apology);
            }
        }
        MessageType::Restoration | MessageType::Unknown => {}
    }

    set
}

fn scheduled_time(upper: &str, advisories: &mut Vec<String>) -> Option<ScheduleSlot> {
    if let Some(caps) = FORMAL_TIME.captures(upper) {
        if caps.get(2).is_some_and(|sep| sep.as_str() != ":") {
            advisories.push(ADVICE_TIME_SEPARATOR.to_string());
        }
        return Some(ScheduleSlot::Time(canonical_time(
            caps.get(1)?.as_str(),
            caps.get(3)?.as_str(),
        )));
    }

    let caps = LOOSE_TIME.captures(upper)?;
    advisories.push(ADVICE_TIME_FORM.to_string());
    Some(ScheduleSlot::Time(canonical_time(
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
    )))
}

fn canonical_time(hour: &str, minute: &str) -> String {
    format!("{hour:0>2}:{minute}")
}

fn train_route(upper: &str, advisories: &mut Vec<String>) -> Option<RouteSlot> {
    let origin = ORIGIN.captures(upper).and_then(|c| group(&c, 1));
    let destination = DESTINATION.captures(upper).and_then(|c| group(&c, 1));

    if origin.is_some() && destination.is_some() {
        return Some(RouteSlot::Route {
            origin,
            destination,
        });
    }

    let informal = [(&*BETWEEN, ADVICE_ROUTE_BETWEEN), (&*FROM_TO, ADVICE_ROUTE_TO)];
    for (regex, advice) in informal {
        if let Some(caps) = regex.captures(upper)
            && let (Some(a), Some(b)) = (group(&caps, 1), group(&caps, 2))
        {
            advisories.push(advice.to_string());
            return Some(RouteSlot::Route {
                origin: Some(a),
                destination: Some(b),
            });
        }
    }

    if origin.is_some() || destination.is_some() {
        Some(RouteSlot::Route {
            origin,
            destination,
        })
    } else {
        None
    }
}

fn location(upper: &str) -> Option<String> {
    LOCATION
        .captures_iter(upper)
        .filter_map(|caps| group(&caps, 1))
        .find(|place| !is_time_of_day(place))
}

fn is_time_of_day(place: &str) -> bool {
    NOT_LOCATIONS.iter().any(|phrase| {
        place
            .strip_prefix(phrase)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::types::Status;

    fn table() -> ContingencyTable {
        ContingencyTable::from_rows(&serde_json::json!([
            {"codigo": "03", "forma_comunicacion": "PROBLEMAS TÉCNICOS"},
            {"codigo": "12", "forma_comunicacion": "OBRA EN ZONA DE VÍAS"},
        ]))
        .unwrap()
    }

    #[test]
    fn full_train_message() {
        let set = extract(
            "EL TREN 1234 DE LAS 10:00 HS CIRCULA CON DEMORAS DE 20 MINUTOS DESDE RETIRO HACIA PILAR POR PROBLEMAS TÉCNICOS 03.1.A",
            &table(),
        );
        assert_eq!(set.message_type, MessageType::SpecificTrain);
        assert_eq!(set.identity.as_deref(), Some("1234"));
        let status = set.status.as_ref().unwrap();
        assert_eq!(status.status, Status::Delay);
        assert_eq!(status.minutes, Some(20));
        assert_eq!(set.cause_code(), Some("03"));
        assert_eq!(set.scheduled_time(), Some("10:00"));
        assert_eq!(
            set.route,
            Some(RouteSlot::Route {
                origin: Some("RETIRO".into()),
                destination: Some("PILAR".into()),
            })
        );
        assert_eq!(set.code.as_ref().unwrap().literal, "03.1.A");
        assert!(set.structure_valid);
        assert!(set.format_advisories.is_empty());
    }

    #[test]
    fn time_with_period_separator_is_advised() {
        let mut advisories = Vec::new();
        let slot = scheduled_time("EL TREN 5 DE LAS 9.05 HS", &mut advisories);
        assert_eq!(slot, Some(ScheduleSlot::Time("09:05".into())));
        assert_eq!(advisories, vec![ADVICE_TIME_SEPARATOR.to_string()]);
    }

    #[test]
    fn loose_time_is_advised() {
        let mut advisories = Vec::new();
        let slot = scheduled_time("EL TREN 5 SALIDA 14:30 DESDE X", &mut advisories);
        assert_eq!(slot, Some(ScheduleSlot::Time("14:30".into())));
        assert_eq!(advisories, vec![ADVICE_TIME_FORM.to_string()]);
    }

    #[test]
    fn minutes_are_not_a_time() {
        let mut advisories = Vec::new();
        assert!(scheduled_time("CON DEMORAS DE 20 MINUTOS", &mut advisories).is_none());
    }

    #[test]
    fn between_route_is_informal() {
        let mut advisories = Vec::new();
        let route = train_route(
            "EL TREN 10 ENTRE CONSTITUCION Y EZEIZA HA SIDO CANCELADO",
            &mut advisories,
        );
        assert_eq!(
            route,
            Some(RouteSlot::Route {
                origin: Some("CONSTITUCION".into()),
                destination: Some("EZEIZA".into()),
            })
        );
        assert_eq!(advisories, vec![ADVICE_ROUTE_BETWEEN.to_string()]);
    }

    #[test]
    fn from_to_route_is_informal() {
        let mut advisories = Vec::new();
        let route = train_route(
            "EL TREN 10 SALE DE CONSTITUCION A GLEW CON DEMORA",
            &mut advisories,
        );
        assert_eq!(
            route,
            Some(RouteSlot::Route {
                origin: Some("CONSTITUCION".into()),
                destination: Some("GLEW".into()),
            })
        );
        assert_eq!(advisories, vec![ADVICE_ROUTE_TO.to_string()]);
    }

    #[test]
    fn destination_only() {
        let mut advisories = Vec::new();
        let route = train_route("EL TREN 10 HACIA PILAR HA SIDO CANCELADO", &mut advisories);
        assert_eq!(
            route,
            Some(RouteSlot::Route {
                origin: None,
                destination: Some("PILAR".into()),
            })
        );
    }

    #[test]
    fn general_service_location_and_apology() {
        let set = extract(
            "El servicio Retiro-Cabred se encuentra interrumpido en Villa Ballester por obra en zona de vías. Sepa disculpar las molestias 12.6.A",
            &table(),
        );
        assert_eq!(set.message_type, MessageType::GeneralService);
        assert_eq!(set.identity.as_deref(), Some("RETIRO-CABRED"));
        assert_eq!(
            set.schedule,
            Some(ScheduleSlot::Location("VILLA BALLESTER".into()))
        );
        assert_eq!(set.route, Some(RouteSlot::Apology));
        assert_eq!(set.cause_code(), Some("12"));
        assert!(set.structure_valid);
    }

    #[test]
    fn time_of_day_is_not_a_location() {
        assert_eq!(location("CIRCULA REDUCIDO EN LA TARDE"), None);
        assert_eq!(
            location("EN EL TRANSCURSO DEL DIA. EN LANUS."),
            Some("LANUS".into())
        );
    }

    #[test]
    fn code_without_recognized_format() {
        let set = extract("ATENCION PASAJEROS 03.1.A", &table());
        assert_eq!(set.message_type, MessageType::Unknown);
        assert!(set.code.is_some());
        assert!(!set.structure_valid);
        assert_eq!(set.format_advisories, vec![ADVICE_UNKNOWN_FORMAT.to_string()]);
    }
}
