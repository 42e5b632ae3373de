//! State matcher: canonical service status from message phrasing.

use std::sync::LazyLock;

use regex::Regex;

use super::matcher::PatternTable;
use super::types::{Status, StatusSlot};

/// Formal phrasings, in priority order.
static FORMAL: LazyLock<PatternTable<Status>> = LazyLock::new(|| {
    PatternTable::new(&[
        (r"CIRCULA\s+CON\s+DEMORAS?(?:\s+DE)?", Status::Delay),
        (r"REGISTRA\s+DEMORAS?", Status::Delay),
        (r"SE\s+ENCUENTRA\s+DEMORANDO", Status::Delay),
        (r"DEMORANDO\s+SU\s+PARTIDA", Status::Delay),
        (r"DEMORAS?\s+EN\s+(?:LA\s+)?PARTIDA", Status::Delay),
        (r"PARTIDA\s+DEMORADA", Status::Delay),
        (r"HA\s+SIDO\s+CANCELADO", Status::Cancellation),
        (r"FUE\s+CANCELADO", Status::Cancellation),
        (r"SE\s+CANCEL[OÓ]", Status::Cancellation),
        (r"SER[AÁ]\s+CANCELADO", Status::Cancellation),
        (r"HA\s+SIDO\s+SUSPENDIDO", Status::Suspension),
        (r"FUE\s+SUSPENDIDO", Status::Suspension),
        (r"SE\s+SUSPEND[EÍ]", Status::Suspension),
        (r"SER[AÁ]\s+SUSPENDIDO", Status::Suspension),
        (r"SUSPENDIDO\s+EN", Status::Suspension),
        // common misspelling still carries the status
        (r"SER[AÁ]\s+SUSPENDIOD", Status::Suspension),
        (r"SE\s+RESTABLECE", Status::Restoration),
        (r"RESTABLECE\s+(?:EL\s+)?SERVICIO", Status::Restoration),
        (r"SERVICIO\s+RESTABLECIDO", Status::Restoration),
        (r"CIRCULA\s+REDUCIDO", Status::Reduced),
        (r"SERVICIO\s+REDUCIDO", Status::Reduced),
        (r"CIRCULA\s+(?:DE\s+FORMA\s+)?CONDICIONAL", Status::Conditional),
        (r"SE\s+ENCUENTRA\s+INTERRUMPIDO", Status::Interrupted),
        (r"EST[ÁA]\s+INTERRUMPIDO", Status::Interrupted),
        (r"INTERRUMPIDO\s+(?:ENTRE|EN)", Status::Interrupted),
    ])
});

/// Bare words that still reveal a status.
static INFORMAL: LazyLock<PatternTable<Status>> = LazyLock::new(|| {
    PatternTable::new(&[
        (r"\bDEMORAS?\b", Status::Delay),
        (r"\bCANCELAD[OA]S?\b", Status::Cancellation),
    ])
});

static DELAY_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:DEMORAS?|REGISTRA)\s+(?:DE\s+)?(\d+)\s*(?:MINUTOS?|MIN\.?)")
        .expect("delay minutes regex must compile")
});

static DEPARTURE_DELAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DEMORANDO\s+(?:SU\s+)?PARTIDA|DEMORAS?\s+EN\s+(?:LA\s+)?PARTIDA|PARTIDA\s+DEMORADA")
        .expect("departure delay regex must compile")
});

/// Detect the status in normalized uppercase text.
pub fn detect_status(upper: &str) -> Option<StatusSlot> {
    let (status, formal) = match FORMAL.first_tag(upper) {
        Some(status) => (status, true),
        None => (INFORMAL.first_tag(upper)?, false),
    };

    let (minutes, departure_delay) = if status == Status::Delay {
        let minutes = DELAY_MINUTES
            .captures(upper)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        (minutes, DEPARTURE_DELAY.is_match(upper))
    } else {
        (None, false)
    };

    Some(StatusSlot {
        status,
        minutes,
        formal,
        departure_delay,
    })
}
