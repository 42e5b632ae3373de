//! Shared types for the validation pipeline.

use serde::{Deserialize, Deserializer, Serialize};

// ── Input message ───────────────────────────────────────────────────

/// An operator status message as harvested from the portal.
///
/// Field aliases accept the harvester's native JSON keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier (numeric or textual in the source).
    #[serde(alias = "numero_mensaje", deserialize_with = "string_or_number")]
    pub id: String,
    /// Free-text body written by the operator.
    #[serde(alias = "contenido")]
    pub content: String,
    /// Line/service the message was sent for (e.g. "Roca").
    #[serde(alias = "linea", default)]
    pub line: String,
    /// Operator who sent it.
    #[serde(alias = "operador", default)]
    pub operator: String,
    /// Send timestamp, `%d/%m/%Y %H:%M:%S`. Kept raw: a malformed value only
    /// makes timing uncomputable.
    #[serde(alias = "fecha_hora", default)]
    pub sent_at: String,
}

/// Timestamp format of [`Message::sent_at`].
pub const SENT_AT_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// ── Classification enums ────────────────────────────────────────────

/// What a message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A single numbered train.
    SpecificTrain,
    /// A whole service, branch or line.
    GeneralService,
    /// Service is being restored.
    Restoration,
    /// No known shape matched.
    Unknown,
}

/// Canonical service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Delay,
    Cancellation,
    Suspension,
    Restoration,
    Reduced,
    Conditional,
    Interrupted,
}

impl Status {
    /// Status code used in the Y position of a structural code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Delay => "1",
            Self::Cancellation => "2",
            Self::Suspension => "2B",
            Self::Restoration => "3",
            Self::Reduced => "4",
            Self::Conditional => "5",
            Self::Interrupted => "6",
        }
    }

    /// Status named by a structural-code Y value.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim_start_matches('0') {
            "1" => Some(Self::Delay),
            "2" => Some(Self::Cancellation),
            "2B" => Some(Self::Suspension),
            "3" => Some(Self::Restoration),
            "4" => Some(Self::Reduced),
            "5" => Some(Self::Conditional),
            "6" => Some(Self::Interrupted),
            _ => None,
        }
    }

    /// Operator-facing name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Delay => "DEMORA",
            Self::Cancellation => "CANCELACIÓN",
            Self::Suspension => "SUSPENSIÓN",
            Self::Restoration => "RESTABLECIMIENTO",
            Self::Reduced => "REDUCIDO",
            Self::Conditional => "CONDICIONAL",
            Self::Interrupted => "INTERRUMPIDO",
        }
    }

    /// Statuses for which send timeliness is not measured.
    pub fn skips_timing(self) -> bool {
        matches!(
            self,
            Self::Reduced | Self::Interrupted | Self::Conditional | Self::Restoration
        )
    }

    /// Cancellation and suspension share tolerance rules and code family 2.
    pub fn is_cancellation_like(self) -> bool {
        matches!(self, Self::Cancellation | Self::Suspension)
    }
}

// ── Component slots ─────────────────────────────────────────────────

/// Slot B: detected status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSlot {
    pub status: Status,
    /// Delay minutes, when stated.
    pub minutes: Option<u32>,
    /// Whether canonical phrasing was used.
    pub formal: bool,
    /// Delay described as a departure delay (minutes optional).
    pub departure_delay: bool,
}

/// Slot C: detected contingency cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseSlot {
    /// Two-digit contingency code.
    pub code: String,
    /// Literal phrase that triggered the match.
    pub phrase: String,
}

/// Slot D: a scheduled time for trains, a location for general services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScheduleSlot {
    /// Canonical `HH:MM`.
    Time(String),
    Location(String),
}

impl ScheduleSlot {
    pub fn time(&self) -> Option<&str> {
        match self {
            Self::Time(t) => Some(t),
            Self::Location(_) => None,
        }
    }
}

/// Slot E: a route for trains, an apology for general services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteSlot {
    Route {
        origin: Option<String>,
        destination: Option<String>,
    },
    Apology,
}

impl RouteSlot {
    /// True for a route naming both ends, or for an apology.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Route {
                origin,
                destination,
            } => origin.is_some() && destination.is_some(),
            Self::Apology => true,
        }
    }
}

/// Slot F: the literal `X.Y.Z` structural code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralCode {
    /// Canonical `X.Y.Z` as written (separators normalized to `.`).
    pub literal: String,
    /// X, zero-padded to two digits: the contingency code.
    pub cause: String,
    /// Y: the status code.
    pub status: String,
    /// Z: lifecycle stage letter.
    pub stage: char,
}

/// Everything extracted from one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSet {
    pub message_type: MessageType,
    /// A: train number or service name.
    pub identity: Option<String>,
    /// B: status.
    pub status: Option<StatusSlot>,
    /// C: cause.
    pub cause: Option<CauseSlot>,
    /// D: scheduled time or location.
    pub schedule: Option<ScheduleSlot>,
    /// E: route or apology.
    pub route: Option<RouteSlot>,
    /// F: structural code.
    pub code: Option<StructuralCode>,
    /// A code was found and the message type is recognized.
    pub structure_valid: bool,
    /// Spelling and formatting problems.
    pub spelling_issues: Vec<String>,
    /// Informal-but-understood phrasing notes. Never blocking.
    pub format_advisories: Vec<String>,
    /// System note when the external spell checker could not be used.
    pub checker_notice: Option<String>,
}

impl ComponentSet {
    pub fn empty(message_type: MessageType) -> Self {
        Self {
            message_type,
            identity: None,
            status: None,
            cause: None,
            schedule: None,
            route: None,
            code: None,
            structure_valid: false,
            spelling_issues: Vec::new(),
            format_advisories: Vec::new(),
            checker_notice: None,
        }
    }

    pub fn status_kind(&self) -> Option<Status> {
        self.status.as_ref().map(|s| s.status)
    }

    pub fn cause_code(&self) -> Option<&str> {
        self.cause.as_ref().map(|c| c.code.as_str())
    }

    pub fn scheduled_time(&self) -> Option<&str> {
        self.schedule.as_ref().and_then(ScheduleSlot::time)
    }
}

// ── Timing ──────────────────────────────────────────────────────────

/// Qualitative send-promptness bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingBucket {
    /// Sent more than an hour ahead of a delayed departure.
    Excellent,
    /// Sent ahead of a delayed departure.
    VeryGood,
    OnTime,
    Acceptable,
    Critical,
}

/// How early or late a message was sent relative to the event it reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// Signed lateness in minutes, one decimal; negative means sent early.
    pub lateness_minutes: f64,
    pub bucket: TimingBucket,
    /// Scheduled time taken from the message (`HH:MM`).
    pub scheduled: String,
    /// Reference instant compared against (`HH:MM`).
    pub reference: String,
    /// Send time (`HH:MM:SS`).
    pub sent: String,
    /// Minutes added to the schedule (0 for cancellations/suspensions).
    pub delay_minutes: u32,
    /// Compared against a cancellation/suspension event.
    pub cancellation: bool,
}

// ── Issues, verdict, scores ─────────────────────────────────────────

/// Overall severity, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    Cosmetic,
    Advisory,
    Blocking,
}

impl Verdict {
    /// Whether the operator must be notified.
    pub fn requires_notification(self) -> bool {
        matches!(self, Self::Blocking | Self::Advisory)
    }
}

/// Three-bucket issue taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueBuckets {
    /// Must be fixed before publishing.
    pub blocking: Vec<String>,
    /// Should be reviewed.
    pub advisory: Vec<String>,
    /// Stylistic.
    pub cosmetic: Vec<String>,
}

impl IssueBuckets {
    /// Worst bucket present.
    pub fn verdict(&self) -> Verdict {
        if !self.blocking.is_empty() {
            Verdict::Blocking
        } else if !self.advisory.is_empty() {
            Verdict::Advisory
        } else if !self.cosmetic.is_empty() {
            Verdict::Cosmetic
        } else {
            Verdict::Clean
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocking.is_empty() && self.advisory.is_empty() && self.cosmetic.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocking.clear();
        self.advisory.clear();
        self.cosmetic.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletenessGrade {
    Complete,
    Acceptable,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelinessGrade {
    Excellent,
    Good,
    Deficient,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormGrade {
    Impeccable,
    Correct,
    Improvable,
    Deficient,
}

/// A 0–100 score with its grade and the deficiencies that cost points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score<G> {
    /// `None` when the score does not apply.
    pub points: Option<u8>,
    pub grade: G,
    pub notes: Vec<String>,
}

/// The three independent diagnostic scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScores {
    pub completeness: Score<CompletenessGrade>,
    pub timeliness: Score<TimelinessGrade>,
    pub form: Score<FormGrade>,
}

// ── Report ──────────────────────────────────────────────────────────

/// Provenance of the curator override that decided the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub rule_id: String,
    /// Curator's description of the detected pattern.
    pub pattern: String,
    pub action: crate::reference::rules::OverrideAction,
    /// Collection the rule came from (`<scope>/<file>`).
    pub origin: String,
}

/// Result of validating one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: String,
    pub line: String,
    pub operator: String,
    pub sent_at: String,
    pub content: String,
    pub components: ComponentSet,
    pub issues: IssueBuckets,
    pub verdict: Verdict,
    pub timing: Option<TimingResult>,
    pub scores: QualityScores,
    pub requires_notification: bool,
    pub applied_override: Option<AppliedOverride>,
}
