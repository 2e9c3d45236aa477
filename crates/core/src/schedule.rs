//! Tag-encoded schedule parsing and the time-window evaluator.
//!
//! A resource participates when its enable tag matches the configured
//! value. The weekday, start, and stop tags (plus the capacity trio for
//! scaling groups) then define its run window. Parsing is all-or-nothing:
//! a malformed tag set excludes the resource from scheduling entirely
//! instead of defaulting any value.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::TagKeys;
use crate::error::ScheduleError;
use crate::resource::{GroupCapacity, ResourceKind};

// ── Time of day ─────────────────────────────────────────────────────

/// Minutes since local midnight, parsed from a schedule tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Accepts a bare hour (`"10"` → 10:00) or `HH:MM`. Anything else is
    /// a parse failure, never a silent default.
    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let text = raw.trim();
        let bad = || ScheduleError::BadTime(raw.to_string());
        let (hour, minute) = match text.split_once(':') {
            Some((h, m)) => {
                let hour: u16 = h.trim().parse().map_err(|_| bad())?;
                let minute: u16 = m.trim().parse().map_err(|_| bad())?;
                (hour, minute)
            }
            None => (text.parse().map_err(|_| bad())?, 0),
        };
        if hour > 23 || minute > 59 {
            return Err(bad());
        }
        Ok(Self(hour * 60 + minute))
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

// ── Local clock ─────────────────────────────────────────────────────

/// The invocation's wall clock in the configured zone, resolved once.
#[derive(Debug, Clone)]
pub struct LocalNow {
    pub minutes: u16,
    pub weekday: Weekday,
    pub stamp: DateTime<Tz>,
}

impl LocalNow {
    /// Resolve the current time in the configured zone.
    ///
    /// An unknown zone is fatal for the whole invocation: scheduling
    /// against the wrong clock is worse than taking no action at all.
    pub fn resolve(timezone: &str) -> Result<Self, ScheduleError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self::at(Utc::now().with_timezone(&tz)))
    }

    pub fn at(stamp: DateTime<Tz>) -> Self {
        Self {
            minutes: (stamp.hour() * 60 + stamp.minute()) as u16,
            weekday: stamp.weekday(),
            stamp,
        }
    }
}

// ── Schedule tag set ────────────────────────────────────────────────

/// Parsed schedule tags of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTagSet {
    pub start: TimeOfDay,
    pub stop: TimeOfDay,
    pub weekdays: HashSet<Weekday>,
    /// Present exactly for scaling groups.
    pub capacity: Option<GroupCapacity>,
}

/// Tagged parse result for a resource's schedule tags.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleTags {
    /// Enable tag absent or mismatched; the resource does not participate.
    NotEnrolled,
    /// Enrolled but the tag set is unusable; the resource is skipped.
    Invalid(String),
    Valid(ScheduleTagSet),
}

impl ScheduleTags {
    pub fn from_tags(
        tags: &BTreeMap<String, String>,
        keys: &TagKeys,
        kind: ResourceKind,
    ) -> ScheduleTags {
        if !enable_tag_matches(
            tags.get(&keys.schedule).map(String::as_str),
            &keys.schedule_value,
        ) {
            return ScheduleTags::NotEnrolled;
        }

        let weekdays = match tags.get(&keys.weekdays) {
            None => return ScheduleTags::Invalid(format!("missing tag {}", keys.weekdays)),
            Some(raw) => match parse_weekdays(raw) {
                Ok(set) if set.is_empty() => {
                    return ScheduleTags::Invalid(format!("empty tag {}", keys.weekdays))
                }
                Ok(set) => set,
                Err(e) => return ScheduleTags::Invalid(e.to_string()),
            },
        };

        let start = match parse_time_tag(tags, &keys.start) {
            Ok(t) => t,
            Err(e) => return ScheduleTags::Invalid(e),
        };
        let stop = match parse_time_tag(tags, &keys.stop) {
            Ok(t) => t,
            Err(e) => return ScheduleTags::Invalid(e),
        };

        let capacity = if kind == ResourceKind::ScalingGroup {
            match parse_capacity(tags, keys) {
                Ok(c) => Some(c),
                Err(e) => return ScheduleTags::Invalid(e.to_string()),
            }
        } else {
            None
        };

        ScheduleTags::Valid(ScheduleTagSet {
            start,
            stop,
            weekdays,
            capacity,
        })
    }
}

fn parse_time_tag(tags: &BTreeMap<String, String>, key: &str) -> Result<TimeOfDay, String> {
    match tags.get(key) {
        None => Err(format!("missing tag {key}")),
        Some(raw) => TimeOfDay::parse(raw).map_err(|e| e.to_string()),
    }
}

/// Case-insensitive enable-tag comparison; an empty expected value matches
/// any present value.
fn enable_tag_matches(actual: Option<&str>, expected: &str) -> bool {
    let actual = match actual {
        Some(a) => a.trim(),
        None => return false,
    };
    let expected = expected.trim();
    expected.is_empty() || actual.eq_ignore_ascii_case(expected)
}

/// Comma-separated chrono weekday names (`mon`, `tuesday`, ...).
fn parse_weekdays(raw: &str) -> Result<HashSet<Weekday>, ScheduleError> {
    let mut days = HashSet::new();
    for part in raw.split(',') {
        let token = part.trim();
        if token.is_empty() {
            continue;
        }
        let day: Weekday = token
            .parse()
            .map_err(|_| ScheduleError::BadWeekday(token.to_string()))?;
        days.insert(day);
    }
    Ok(days)
}

fn parse_capacity(tags: &BTreeMap<String, String>, keys: &TagKeys) -> Result<GroupCapacity, ScheduleError> {
    let read = |key: &str| -> Result<i32, ScheduleError> {
        tags.get(key)
            .ok_or_else(|| ScheduleError::BadCapacity(format!("missing tag {key}")))?
            .trim()
            .parse()
            .map_err(|_| ScheduleError::BadCapacity(format!("non-integer tag {key}")))
    };
    let min = read(&keys.asg_min)?;
    let max = read(&keys.asg_max)?;
    let desired = read(&keys.asg_desired)?;

    if min < 0 || max < 0 || desired < 0 {
        return Err(ScheduleError::BadCapacity("negative capacity".to_string()));
    }
    if min > max {
        return Err(ScheduleError::BadCapacity(format!("min {min} exceeds max {max}")));
    }
    Ok(GroupCapacity {
        min,
        max,
        desired: desired.clamp(min, max),
    })
}

// ── Window evaluation ───────────────────────────────────────────────

/// What the evaluator wants for a resource this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    Run,
    Sleep,
    /// `start == stop`: the window is undefined, take no action.
    Skip,
}

pub fn evaluate_window(set: &ScheduleTagSet, now: &LocalNow) -> WindowVerdict {
    if !set.weekdays.contains(&now.weekday) {
        return WindowVerdict::Sleep;
    }
    let (start, stop, minutes) = (set.start.minutes(), set.stop.minutes(), now.minutes);
    if start == stop {
        return WindowVerdict::Skip;
    }
    let running = if start < stop {
        start <= minutes && minutes < stop
    } else {
        // Window crosses midnight. Weekday membership is checked against
        // the calendar day of `now`, not the day the window opened on.
        minutes >= start || minutes < stop
    };
    if running {
        WindowVerdict::Run
    } else {
        WindowVerdict::Sleep
    }
}
