//! Message type classifier.

use std::sync::LazyLock;

use super::matcher::{PatternTable, group};
use super::types::MessageType;

/// Checked in order: restoration, then train, then general service.
static MESSAGE_TYPES: LazyLock<PatternTable<MessageType>> = LazyLock::new(|| {
    PatternTable::new(&[
        (
            r"SE\s+RESTABLECE|RESTABLECE\s+(?:EL\s+)?SERVICIO",
            MessageType::Restoration,
        ),
        (
            r"(?:EL\s+)?TREN\s+(?:N[°º]?\s*)?(\d+)",
            MessageType::SpecificTrain,
        ),
        (
            r"(?:EL\s+)?(?:SERVICIO|RAMAL|L[ÍI]NEA)\s+([A-ZÁÉÍÓÚÑ\s\-\.]+?)(?:\s+SE\s+|\s+CIRCULA|\s+HA\s+)",
            MessageType::GeneralService,
        ),
    ])
});

/// Branch or line named by a restoration announcement.
static RESTORED_LINE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?:RAMAL|L[ÍI]NEA)\s+([A-ZÁÉÍÓÚÑ\s\-\.]+?)(?:\s+SE\s+|\s+RESTABLECE)")
        .expect("restored line regex must compile")
});

/// Classification result: the type plus the identity it was recognized by
/// (train number, service name, or restored line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub message_type: MessageType,
    pub identity: Option<String>,
}

/// Classify normalized uppercase text.
pub fn classify(upper: &str) -> Classification {
    match MESSAGE_TYPES.first_captures(upper) {
        Some((MessageType::Restoration, _)) => Classification {
            message_type: MessageType::Restoration,
            identity: RESTORED_LINE
                .captures(upper)
                .and_then(|caps| group(&caps, 1)),
        },
        Some((message_type, caps)) => Classification {
            message_type,
            identity: group(&caps, 1),
        },
        None => Classification {
            message_type: MessageType::Unknown,
            identity: None,
        },
    }
}
