//! Message validation: extraction, checks, scoring and the verdict.

pub mod classify;
pub mod engine;
pub mod extract;
pub mod languagetool;
pub mod matcher;
pub mod normalize;
pub mod scoring;
pub mod spelling;
pub mod status;
pub mod structure;
pub mod timing;
pub mod types;

pub use engine::Validator;
pub use languagetool::LanguageToolChecker;
pub use spelling::{OrthographyChecker, SpellChecker, SpellFinding, SpellSession};
pub use types::{
    ComponentSet, IssueBuckets, Message, MessageType, QualityScores, Status, TimingBucket,
    TimingResult, ValidationReport, Verdict,
};
