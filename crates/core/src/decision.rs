//! The decision engine: desired state versus observed state.
//!
//! Decisions are pure and idempotent: a resource already in its desired
//! state yields `Action::None`, so re-running the engine against unchanged
//! state never produces a second action.

use crate::config::TagKeys;
use crate::resource::{
    ExpectedState, GroupCapacity, ObservedState, PowerState, ResourceKind, ResourceRecord,
};
use crate::schedule::{evaluate_window, LocalNow, ScheduleTags, WindowVerdict};

/// The action the engine wants for one resource this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    Stop,
    Resize(GroupCapacity),
    /// Already in the desired state, or not participating.
    None,
    /// Enrolled but unschedulable this tick (bad tags or undefined window).
    Skip,
}

impl Action {
    pub fn is_actionable(&self) -> bool {
        matches!(self, Action::Start | Action::Stop | Action::Resize(_))
    }
}

/// One resource's decision, with a human-readable reason.
#[derive(Debug, Clone)]
pub struct ScheduleDecision {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: Action,
    pub reason: String,
}

impl ScheduleDecision {
    /// The state the resource is expected to reach once the action lands.
    pub fn expected_state(&self) -> Option<ExpectedState> {
        match &self.action {
            Action::Start => Some(ExpectedState::Running),
            Action::Stop => Some(ExpectedState::Stopped),
            Action::Resize(capacity) => Some(ExpectedState::Capacity(*capacity)),
            Action::None | Action::Skip => None,
        }
    }
}

pub fn decide(record: &ResourceRecord, keys: &TagKeys, now: &LocalNow) -> ScheduleDecision {
    let (action, reason) = decide_inner(record, keys, now);
    ScheduleDecision {
        resource_id: record.id.clone(),
        kind: record.kind,
        action,
        reason,
    }
}

fn decide_inner(record: &ResourceRecord, keys: &TagKeys, now: &LocalNow) -> (Action, String) {
    let set = match ScheduleTags::from_tags(&record.tags, keys, record.kind) {
        ScheduleTags::NotEnrolled => return (Action::None, "not enrolled".to_string()),
        ScheduleTags::Invalid(reason) => return (Action::Skip, reason),
        ScheduleTags::Valid(set) => set,
    };

    let should_run = match evaluate_window(&set, now) {
        WindowVerdict::Skip => return (Action::Skip, "start equals stop".to_string()),
        WindowVerdict::Run => true,
        WindowVerdict::Sleep => false,
    };

    match &record.state {
        ObservedState::Power(power) => power_action(power, should_run),
        ObservedState::Capacity(current) => match set.capacity {
            Some(target) => capacity_action(current, target, should_run),
            None => (Action::Skip, "capacity tags unavailable".to_string()),
        },
    }
}

fn power_action(power: &PowerState, should_run: bool) -> (Action, String) {
    match power {
        PowerState::Stopped if should_run => (Action::Start, "inside run window".to_string()),
        PowerState::Running if !should_run => (Action::Stop, "outside run window".to_string()),
        PowerState::Running => (Action::None, "already running".to_string()),
        PowerState::Stopped => (Action::None, "already stopped".to_string()),
        PowerState::Other(state) => (Action::None, format!("transitional state {state}")),
    }
}

fn capacity_action(
    current: &GroupCapacity,
    target: GroupCapacity,
    should_run: bool,
) -> (Action, String) {
    // When the window closes the group scales to zero; the tag-specified
    // values are left untouched for the next wake-up.
    let goal = if should_run { target } else { GroupCapacity::ZERO };
    if *current == goal {
        let reason = if should_run {
            "capacity already applied"
        } else {
            "already scaled to zero"
        };
        return (Action::None, reason.to_string());
    }
    let reason = if should_run {
        "inside run window"
    } else {
        "outside run window"
    };
    (Action::Resize(goal), reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::LocalNow;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn now_wed_10() -> LocalNow {
        // 2025-06-04 is a Wednesday.
        LocalNow::at(chrono_tz::UTC.with_ymd_and_hms(2025, 6, 4, 10, 0, 0).unwrap())
    }

    fn now_mon_2330() -> LocalNow {
        // 2025-06-02 is a Monday.
        LocalNow::at(chrono_tz::UTC.with_ymd_and_hms(2025, 6, 2, 23, 30, 0).unwrap())
    }

    fn weekday_tags(start: &str, stop: &str) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        tags.insert("Schedule".to_string(), "True".to_string());
        tags.insert("Schedule_Start".to_string(), start.to_string());
        tags.insert("Schedule_Stop".to_string(), stop.to_string());
        tags.insert(
            "Schedule_Weekend".to_string(),
            "mon,tue,wed,thu,fri".to_string(),
        );
        tags
    }

    fn instance(state: PowerState, tags: BTreeMap<String, String>) -> ResourceRecord {
        ResourceRecord {
            id: "i-0abc".to_string(),
            kind: ResourceKind::Ec2Instance,
            account_id: "111122223333".to_string(),
            region: "ap-northeast-2".to_string(),
            state: ObservedState::Power(state),
            tags,
        }
    }

    fn scaling_group(current: GroupCapacity, tags: BTreeMap<String, String>) -> ResourceRecord {
        ResourceRecord {
            id: "web-asg".to_string(),
            kind: ResourceKind::ScalingGroup,
            account_id: "111122223333".to_string(),
            region: "ap-northeast-2".to_string(),
            state: ObservedState::Capacity(current),
            tags,
        }
    }

    #[test]
    fn stopped_instance_inside_window_starts() {
        let keys = TagKeys::default();
        let record = instance(PowerState::Stopped, weekday_tags("09:00", "18:00"));
        let decision = decide(&record, &keys, &now_wed_10());
        assert_eq!(decision.action, Action::Start);
        assert_eq!(decision.expected_state(), Some(ExpectedState::Running));
    }

    #[test]
    fn running_instance_inside_window_is_noop() {
        let keys = TagKeys::default();
        let record = instance(PowerState::Running, weekday_tags("09:00", "18:00"));
        let decision = decide(&record, &keys, &now_wed_10());
        assert_eq!(decision.action, Action::None);
        assert_eq!(decision.expected_state(), None);
    }

    #[test]
    fn second_pass_after_action_is_noop() {
        let keys = TagKeys::default();
        let now = now_wed_10();

        let before = instance(PowerState::Stopped, weekday_tags("09:00", "18:00"));
        assert_eq!(decide(&before, &keys, &now).action, Action::Start);

        // The action landed; re-running against the new state does nothing.
        let after = instance(PowerState::Running, weekday_tags("09:00", "18:00"));
        assert_eq!(decide(&after, &keys, &now).action, Action::None);
    }

    #[test]
    fn wrap_around_window_starts_before_midnight() {
        let keys = TagKeys::default();
        let mut tags = weekday_tags("22:00", "02:00");
        tags.insert(
            "Schedule_Weekend".to_string(),
            "mon,tue,wed,thu,fri,sat,sun".to_string(),
        );
        let record = instance(PowerState::Stopped, tags);
        assert_eq!(decide(&record, &keys, &now_mon_2330()).action, Action::Start);
    }

    #[test]
    fn equal_start_stop_skips() {
        let keys = TagKeys::default();
        let record = instance(PowerState::Running, weekday_tags("12:00", "12:00"));
        let decision = decide(&record, &keys, &now_wed_10());
        assert_eq!(decision.action, Action::Skip);
        assert_eq!(decision.reason, "start equals stop");
    }

    #[test]
    fn missing_weekday_tag_skips() {
        let keys = TagKeys::default();
        let mut tags = weekday_tags("09:00", "18:00");
        tags.remove("Schedule_Weekend");
        let record = instance(PowerState::Running, tags);
        assert_eq!(decide(&record, &keys, &now_wed_10()).action, Action::Skip);
    }

    #[test]
    fn unenrolled_resource_is_noop() {
        let keys = TagKeys::default();
        let record = instance(PowerState::Running, BTreeMap::new());
        let decision = decide(&record, &keys, &now_wed_10());
        assert_eq!(decision.action, Action::None);
        assert_eq!(decision.reason, "not enrolled");
    }

    #[test]
    fn transitional_state_is_left_alone() {
        let keys = TagKeys::default();
        let record = instance(
            PowerState::Other("stopping".to_string()),
            weekday_tags("09:00", "18:00"),
        );
        assert_eq!(decide(&record, &keys, &now_wed_10()).action, Action::None);
    }

    fn asg_tags() -> BTreeMap<String, String> {
        let mut tags = weekday_tags("09:00", "18:00");
        tags.insert("Schedule_Asg_Min".to_string(), "1".to_string());
        tags.insert("Schedule_Asg_Max".to_string(), "4".to_string());
        tags.insert("Schedule_Asg_Desired".to_string(), "2".to_string());
        tags
    }

    #[test]
    fn scaling_group_resizes_to_tag_values_inside_window() {
        let keys = TagKeys::default();
        let record = scaling_group(GroupCapacity::ZERO, asg_tags());
        let decision = decide(&record, &keys, &now_wed_10());
        let target = GroupCapacity {
            min: 1,
            max: 4,
            desired: 2,
        };
        assert_eq!(decision.action, Action::Resize(target));
        assert_eq!(decision.expected_state(), Some(ExpectedState::Capacity(target)));
    }

    #[test]
    fn scaling_group_at_target_is_noop() {
        let keys = TagKeys::default();
        let record = scaling_group(
            GroupCapacity {
                min: 1,
                max: 4,
                desired: 2,
            },
            asg_tags(),
        );
        assert_eq!(decide(&record, &keys, &now_wed_10()).action, Action::None);
    }

    #[test]
    fn scaling_group_scales_to_zero_outside_window() {
        let keys = TagKeys::default();
        // Monday 23:30 is outside the 09:00-18:00 window.
        let record = scaling_group(
            GroupCapacity {
                min: 1,
                max: 4,
                desired: 2,
            },
            asg_tags(),
        );
        let decision = decide(&record, &keys, &now_mon_2330());
        assert_eq!(decision.action, Action::Resize(GroupCapacity::ZERO));
        // The capacity tags themselves are untouched.
        assert_eq!(record.tags.get("Schedule_Asg_Desired").unwrap(), "2");
    }

    #[test]
    fn zeroed_scaling_group_outside_window_is_noop() {
        let keys = TagKeys::default();
        let record = scaling_group(GroupCapacity::ZERO, asg_tags());
        assert_eq!(decide(&record, &keys, &now_mon_2330()).action, Action::None);
    }
}
