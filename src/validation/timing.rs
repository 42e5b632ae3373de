//! Timing evaluator: how promptly a message was sent.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::debug;

use super::types::{
    ComponentSet, MessageType, SENT_AT_FORMAT, Status, TimingBucket, TimingResult,
};

/// Hours before this count as early morning.
const EARLY_HOURS_END: u32 = 6;
/// Hours from this on count as late evening.
const LATE_EVENING_START: u32 = 18;

/// Evaluate send timeliness. `None` when timing does not apply to this
/// message or any timestamp fails to parse.
pub fn evaluate(components: &ComponentSet, sent_at: &str) -> Option<TimingResult> {
    if components.message_type == MessageType::GeneralService {
        return None;
    }
    let status = components.status.as_ref()?;
    if status.status.skips_timing() {
        return None;
    }
    let scheduled = components.scheduled_time()?;

    let cancellation = status.status.is_cancellation_like();
    let delay_minutes = match status.status {
        Status::Delay => status.minutes?,
        _ if cancellation => 0,
        _ => return None,
    };

    let sent = match NaiveDateTime::parse_from_str(sent_at.trim(), SENT_AT_FORMAT) {
        Ok(sent) => sent,
        Err(e) => {
            debug!(sent_at = %sent_at, error = %e, "Timing not computable: bad send timestamp");
            return None;
        }
    };
    let time = match NaiveTime::parse_from_str(scheduled, "%H:%M") {
        Ok(time) => time,
        Err(e) => {
            debug!(scheduled = %scheduled, error = %e, "Timing not computable: bad scheduled time");
            return None;
        }
    };

    let reference = schedule_date(sent, time).and_time(time)
        + Duration::minutes(i64::from(delay_minutes));

    let lateness = (sent - reference).num_seconds() as f64 / 60.0;
    let lateness_minutes = (lateness * 10.0).round() / 10.0;

    Some(TimingResult {
        lateness_minutes,
        bucket: bucket(lateness, cancellation),
        scheduled: scheduled.to_string(),
        reference: reference.format("%H:%M").to_string(),
        sent: sent.format("%H:%M:%S").to_string(),
        delay_minutes,
        cancellation,
    })
}

/// Date the scheduled time falls on. Normally the send date; a late-night
/// service reported in the early hours belongs to the previous day, and an
/// early-hours service reported late in the evening to the next one.
fn schedule_date(sent: NaiveDateTime, scheduled: NaiveTime) -> NaiveDate {
    let date = sent.date();
    let (sent_hour, scheduled_hour) = (sent.hour(), scheduled.hour());
    if sent_hour < EARLY_HOURS_END && scheduled_hour >= LATE_EVENING_START {
        date.pred_opt().unwrap_or(date)
    } else if sent_hour >= LATE_EVENING_START && scheduled_hour < EARLY_HOURS_END {
        date.succ_opt().unwrap_or(date)
    } else {
        date
    }
}

/// Bucket a signed lateness. Cancellations sent early are always on time.
pub fn bucket(lateness: f64, cancellation: bool) -> TimingBucket {
    match lateness {
        l if !cancellation && l < -60.0 => TimingBucket::Excellent,
        l if !cancellation && l < 0.0 => TimingBucket::VeryGood,
        l if l <= 5.0 => TimingBucket::OnTime,
        l if l <= 10.0 => TimingBucket::Acceptable,
        _ => TimingBucket::Critical,
    }
}
