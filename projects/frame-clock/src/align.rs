// Seek offset calculation
//
// Maps a wall-clock target time onto a position inside a video whose first and
// last frames carry known wall-clock times.

use crate::clock::NormalizedTime;
use serde::Serialize;

/// Seconds into the video; always within `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SeekOffset(f64);

impl SeekOffset {
    pub const START: SeekOffset = SeekOffset(0.0);

    pub fn clamped(seconds: f64, duration: f64) -> Self {
        Self(seconds.clamp(0.0, duration.max(0.0)))
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }
}

/// Recoverable conditions hit while computing an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetCondition {
    /// The target could not be parsed and the initial time was used instead.
    TargetUnparsed,
    /// The target lies outside `[initial, end]`; playback starts at 0.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetOutcome {
    pub offset: SeekOffset,
    pub duration_secs: f64,
    pub conditions: Vec<OffsetCondition>,
}

impl OffsetOutcome {
    pub fn has(&self, condition: OffsetCondition) -> bool {
        self.conditions.contains(&condition)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OffsetInputs {
    pub initial: NormalizedTime,
    pub end: NormalizedTime,
    pub target: Option<NormalizedTime>,
    /// Seconds of day of the manual jump time, 0 when unused.
    pub jump_secs: u32,
}

/// Total video duration implied by the boundary times, never negative.
pub fn video_duration(initial: &NormalizedTime, end: &NormalizedTime) -> f64 {
    end.seconds_since(initial).max(0.0)
}

/// Computes where playback should start.
///
/// A non-zero jump is reduced by the initial time of day and, when it is still
/// non-zero, replaces the target-derived offset instead of adjusting it.
pub fn compute_offset(inputs: &OffsetInputs) -> OffsetOutcome {
    let mut conditions = Vec::new();
    let duration = video_duration(&inputs.initial, &inputs.end);

    let target = match inputs.target {
        Some(target) => target,
        None => {
            conditions.push(OffsetCondition::TargetUnparsed);
            inputs.initial
        }
    };

    if target < inputs.initial || target > inputs.end {
        conditions.push(OffsetCondition::OutOfRange);
        return OffsetOutcome {
            offset: SeekOffset::START,
            duration_secs: duration,
            conditions,
        };
    }

    let base = target.seconds_since(&inputs.initial);
    let raw_jump = inputs.jump_secs as f64;
    let reduced_jump = raw_jump - inputs.initial.seconds_of_day() as f64;

    let seconds = if raw_jump != 0.0 && reduced_jump != 0.0 {
        reduced_jump
    } else {
        base - raw_jump
    };

    OffsetOutcome {
        offset: SeekOffset::clamped(seconds, duration),
        duration_secs: duration,
        conditions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{parse_time, time_to_seconds};

    fn inputs(initial: &str, end: &str, target: &str, jump: &str) -> OffsetInputs {
        OffsetInputs {
            initial: parse_time(initial).unwrap(),
            end: parse_time(end).unwrap(),
            target: parse_time(target),
            jump_secs: time_to_seconds(jump),
        }
    }

    #[test]
    fn test_target_inside_video() {
        let outcome = compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", "09:05:00 AM", ""));
        assert_eq!(outcome.offset.seconds(), 300.0);
        assert_eq!(outcome.duration_secs, 600.0);
        assert!(outcome.conditions.is_empty());
    }

    #[test]
    fn test_target_before_initial_is_out_of_range() {
        let outcome = compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", "08:59:59 AM", ""));
        assert_eq!(outcome.offset, SeekOffset::START);
        assert!(outcome.has(OffsetCondition::OutOfRange));
    }

    #[test]
    fn test_target_after_end_is_out_of_range() {
        let outcome = compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", "21:00:00", ""));
        assert_eq!(outcome.offset, SeekOffset::START);
        assert!(outcome.has(OffsetCondition::OutOfRange));
    }

    #[test]
    fn test_jump_overrides_target() {
        for target in ["09:00:30 AM", "09:05:00 AM", "09:09:00"] {
            let outcome =
                compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", target, "09:02:00"));
            assert_eq!(outcome.offset.seconds(), 120.0, "target {}", target);
        }
    }

    #[test]
    fn test_jump_equal_to_initial_subtracts_from_base() {
        // Reduced jump is zero, so the raw jump is taken off the base offset.
        let outcome = compute_offset(&inputs("00:01:00", "00:11:00", "00:06:00", "00:01:00"));
        assert_eq!(outcome.offset.seconds(), 240.0);
    }

    #[test]
    fn test_jump_before_initial_clamps_to_start() {
        let outcome = compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", "09:05:00 AM", "00:05:00"));
        assert_eq!(outcome.offset, SeekOffset::START);
    }

    #[test]
    fn test_jump_past_end_clamps_to_duration() {
        let outcome = compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", "09:05:00 AM", "10:00:00"));
        assert_eq!(outcome.offset.seconds(), 600.0);
    }

    #[test]
    fn test_unparsed_target_falls_back_to_initial() {
        let outcome = compute_offset(&inputs("09:00:00 AM", "09:10:00 AM", "garbage", ""));
        assert_eq!(outcome.offset, SeekOffset::START);
        assert_eq!(outcome.conditions, vec![OffsetCondition::TargetUnparsed]);
    }

    #[test]
    fn test_unknown_boundaries() {
        // Both boundaries at the midnight sentinel: zero-length video.
        let outcome = compute_offset(&inputs("00:00:00 AM", "00:00:00 AM", "09:05:00 AM", ""));
        assert!(outcome.has(OffsetCondition::OutOfRange));
        assert_eq!(outcome.duration_secs, 0.0);
    }

    #[test]
    fn test_offset_is_bounded_and_repeatable() {
        let times = ["00:00:00", "08:59:00", "09:00:00", "09:03:20", "09:10:00", "23:59:59"];
        for initial in ["09:00:00", "09:10:00"] {
            for end in ["09:00:00", "09:10:00", "10:00:00"] {
                for target in times {
                    for jump in times {
                        let i = inputs(initial, end, target, jump);
                        let first = compute_offset(&i);
                        let second = compute_offset(&i);
                        assert_eq!(first, second);
                        let secs = first.offset.seconds();
                        assert!(secs >= 0.0 && secs <= first.duration_secs);
                    }
                }
            }
        }
    }
}
