//! Merges observation sets and score-system history into one chronological sequence.
//!
//! Both inputs are sorted first, then walked together in a single pass. Gap markers
//! and synthetic score-system changes are injected along the way.

pub mod pages;

use chrono::{DateTime, Duration, FixedOffset};

use crate::model::{GapMarker, ObservationSet, ScoreSystemChangeEvent, TimelineEntry};

pub use pages::{paginate, Page, PAGE_LENGTH};

/// Longest silence between two observation sets before a gap marker is drawn.
pub const NO_OBS_LIMIT_HOURS: i64 = 24;

/// Untimed entries sort before everything else. The sort is stable.
fn sort_by_time<T>(items: &mut [T], time: impl Fn(&T) -> Option<DateTime<FixedOffset>>) {
    items.sort_by_key(|item| time(item));
}

/// Build the timeline with the default 24 hour gap threshold.
pub fn build_timeline(
    observation_sets: Vec<ObservationSet>,
    events: Vec<ScoreSystemChangeEvent>,
) -> Vec<TimelineEntry> {
    build_timeline_with_limit(observation_sets, events, Duration::hours(NO_OBS_LIMIT_HOURS))
}

pub fn build_timeline_with_limit(
    mut observation_sets: Vec<ObservationSet>,
    mut events: Vec<ScoreSystemChangeEvent>,
    gap_limit: Duration,
) -> Vec<TimelineEntry> {
    sort_by_time(&mut observation_sets, |set| set.record_time);
    sort_by_time(&mut events, |event| event.changed_time);

    let mut timeline = Vec::with_capacity(observation_sets.len() + events.len());
    let mut pending = events.into_iter().peekable();
    let mut last_scale: Option<u8> = None;
    let mut last_record_time: Option<DateTime<FixedOffset>> = None;

    for set in observation_sets {
        if let Some(current) = set.record_time {
            if let Some(previous) = last_record_time {
                if current - previous > gap_limit {
                    timeline.push(TimelineEntry::Gap(GapMarker { spo2_scale: last_scale }));
                }
            }
            last_record_time = Some(current);

            while let Some(event) = pending.next_if(|event| {
                event.changed_time.map_or(true, |changed| changed <= current)
            }) {
                last_scale = event.spo2_scale;
                timeline.push(TimelineEntry::ScoreSystemChange(event));
            }
        }

        if let (Some(previous), Some(scale)) = (last_scale, set.spo2_scale) {
            if previous != scale {
                timeline.push(TimelineEntry::ScoreSystemChange(
                    ScoreSystemChangeEvent::synthetic(&set.score_system, scale),
                ));
            }
        }
        last_scale = set.spo2_scale;
        timeline.push(TimelineEntry::Observation(set));
    }

    timeline.extend(pending.map(TimelineEntry::ScoreSystemChange));
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format::parse_timestamp;
    use crate::model::SpecialValue;
    use pretty_assertions::assert_eq;

    fn set(time: Option<&str>, scale: Option<u8>) -> ObservationSet {
        let json = crate::model::request::ObservationSetJson {
            record_time: time.map(str::to_string),
            score_system: Some("news2".into()),
            spo2_scale: scale,
            ..Default::default()
        };
        ObservationSet::from_json(&json, &Default::default())
    }

    fn event(time: Option<&str>, scale: u8) -> ScoreSystemChangeEvent {
        ScoreSystemChangeEvent {
            changed_time: time.and_then(parse_timestamp),
            score_system: "news2".into(),
            spo2_scale: Some(scale),
            initials: "HP".into(),
        }
    }

    fn kinds(timeline: &[TimelineEntry]) -> Vec<&'static str> {
        timeline
            .iter()
            .map(|entry| match entry {
                TimelineEntry::Observation(_) => "obs",
                TimelineEntry::ScoreSystemChange(e) if e.changed_time.is_none() => "synthetic",
                TimelineEntry::ScoreSystemChange(_) => "change",
                TimelineEntry::Gap(_) => "gap",
            })
            .collect()
    }

    #[test]
    fn test_exactly_24_hours_is_not_a_gap() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T10:00:00Z"), Some(1)),
                set(Some("2019-02-02T10:00:00Z"), Some(1)),
            ],
            vec![],
        );
        assert_eq!(kinds(&timeline), vec!["obs", "obs"]);
    }

    #[test]
    fn test_just_over_24_hours_is_one_gap() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T10:00:00.000Z"), Some(2)),
                set(Some("2019-02-02T10:00:00.001Z"), Some(2)),
            ],
            vec![],
        );
        assert_eq!(kinds(&timeline), vec!["obs", "gap", "obs"]);
        assert_eq!(
            timeline[1],
            TimelineEntry::Gap(GapMarker { spo2_scale: Some(2) })
        );
    }

    #[test]
    fn test_sets_are_sorted_before_merge() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T12:00:00Z"), None),
                set(Some("2019-02-01T08:00:00Z"), None),
                set(Some("2019-02-01T10:00:00Z"), None),
            ],
            vec![],
        );
        let times: Vec<_> = timeline
            .iter()
            .map(|entry| match entry {
                TimelineEntry::Observation(set) => set.record_time,
                _ => None,
            })
            .collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_recorded_change_is_not_duplicated() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T08:00:00Z"), Some(1)),
                set(Some("2019-02-01T12:00:00Z"), Some(2)),
            ],
            vec![event(Some("2019-02-01T11:00:00Z"), 2)],
        );
        assert_eq!(kinds(&timeline), vec!["obs", "change", "obs"]);
    }

    #[test]
    fn test_change_at_same_instant_is_drained() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T08:00:00Z"), Some(1)),
                set(Some("2019-02-01T12:00:00Z"), Some(2)),
            ],
            vec![event(Some("2019-02-01T12:00:00Z"), 2)],
        );
        assert_eq!(kinds(&timeline), vec!["obs", "change", "obs"]);
    }

    #[test]
    fn test_unrecorded_change_gets_synthetic_event() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T08:00:00Z"), Some(1)),
                set(Some("2019-02-01T12:00:00Z"), Some(2)),
            ],
            vec![],
        );
        assert_eq!(kinds(&timeline), vec!["obs", "synthetic", "obs"]);
        assert_eq!(timeline[1].spo2_scale(), Some(2));
        assert_eq!(timeline[1].initials(), "");
    }

    #[test]
    fn test_late_change_still_follows_synthetic() {
        // A change recorded after the set it applies to arrives too late to suppress the
        // synthetic marker, so both appear.
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T08:00:00Z"), Some(1)),
                set(Some("2019-02-01T12:00:00Z"), Some(2)),
                set(Some("2019-02-01T16:00:00Z"), Some(2)),
            ],
            vec![event(Some("2019-02-01T12:05:00Z"), 2)],
        );
        assert_eq!(
            kinds(&timeline),
            vec!["obs", "synthetic", "obs", "change", "obs"]
        );
    }

    #[test]
    fn test_leftover_events_are_appended_in_order() {
        let timeline = build_timeline(
            vec![set(Some("2019-02-01T08:00:00Z"), Some(1))],
            vec![
                event(Some("2019-02-03T08:00:00Z"), 1),
                event(Some("2019-02-02T08:00:00Z"), 2),
            ],
        );
        assert_eq!(kinds(&timeline), vec!["obs", "change", "change"]);
        assert_eq!(timeline[1].spo2_scale(), Some(2));
        assert_eq!(timeline[2].spo2_scale(), Some(1));
    }

    #[test]
    fn test_untimed_set_skips_gap_logic() {
        let timeline = build_timeline(
            vec![
                set(Some("2019-02-01T08:00:00Z"), Some(1)),
                set(None, Some(2)),
                set(Some("2019-02-01T09:00:00Z"), Some(2)),
            ],
            vec![],
        );
        // The untimed set sorts first but still takes part in the scale check.
        assert_eq!(
            kinds(&timeline),
            vec!["obs", "synthetic", "obs", "synthetic", "obs"]
        );
        assert_eq!(timeline[0].date(), None);
        assert!(timeline
            .iter()
            .all(|e| e.marker() != Some(SpecialValue::NoReadingsFor24Hours)));
    }
}
