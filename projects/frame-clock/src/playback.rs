// Playback driver: turns a CSV selection into a seek position.

use crate::align::{compute_offset, OffsetCondition, OffsetInputs, SeekOffset};
use crate::clock::{format_seconds, parse_time, time_to_seconds};
use crate::table::{time_token, LogTable, DATE_TIME_COLUMN};
use crate::video::boundary::BoundaryTimes;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_JUMP_TIME: &str = "00:00:00";

fn default_jump_time() -> String {
    DEFAULT_JUMP_TIME.to_string()
}

/// Selection state of one viewer, carried by the caller between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Column to filter on; the first column when unset.
    #[serde(default)]
    pub column: Option<String>,
    /// Selected value of `column`; nothing is played while unset.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "default_jump_time")]
    pub jump_time: String,
    /// Value seen by the previous request, used to detect a new selection.
    #[serde(default)]
    pub previous_value: Option<String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            column: None,
            value: None,
            jump_time: default_jump_time(),
            previous_value: None,
        }
    }
}

impl SessionContext {
    pub fn select(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_jump_time(mut self, jump_time: impl Into<String>) -> Self {
        self.jump_time = jump_time.into();
        self
    }

    /// A newly selected value discards the jump time typed for the old one.
    pub fn apply_selection(&mut self) {
        if self.value.is_some() && self.previous_value != self.value {
            self.jump_time = default_jump_time();
            self.previous_value = self.value.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    CsvEmpty,
    NoMatchingRow,
    MissingDateTimeColumn,
    EmptyTimeString,
    TargetParseFailed,
    OutOfRange,
    EmptyJumpTime,
    InvalidJumpTime,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Notice::CsvEmpty => "CSV file is empty.",
            Notice::NoMatchingRow => {
                "No matching value found in the selected column. Playing from the start."
            }
            Notice::MissingDateTimeColumn => {
                "Column 'DATE AND TIME' not found. Playing from the start."
            }
            Notice::EmptyTimeString => "Time string is empty. Playing from the start.",
            Notice::TargetParseFailed => "Error parsing extracted time. Playing from the start.",
            Notice::OutOfRange => {
                "Extracted time is out of the valid range. Playing from the start."
            }
            Notice::EmptyJumpTime => "Jump Time input is empty. Defaulting to 00:00:00.",
            Notice::InvalidJumpTime => "Invalid jump time format. Defaulting to 00:00:00.",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackPlan {
    /// Where to start playing; `None` when there is nothing to play yet.
    pub offset: Option<SeekOffset>,
    pub offset_display: Option<String>,
    pub initial_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_secs: Option<f64>,
    pub matched_rows: Vec<Vec<String>>,
    pub notices: Vec<Notice>,
    pub messages: Vec<String>,
    pub session: SessionContext,
}

impl PlaybackPlan {
    fn new(boundaries: &BoundaryTimes, session: SessionContext) -> Self {
        Self {
            offset: None,
            offset_display: None,
            initial_time: boundaries.initial.map(|t| t.to_string()),
            end_time: boundaries.end.map(|t| t.to_string()),
            duration_secs: None,
            matched_rows: Vec::new(),
            notices: Vec::new(),
            messages: Vec::new(),
            session,
        }
    }

    fn notice(&mut self, notice: Notice) {
        tracing::info!("{}", notice);
        self.notices.push(notice);
        self.messages.push(notice.to_string());
    }

    fn play_from(mut self, offset: SeekOffset) -> Self {
        self.offset_display = Some(format_seconds(offset.seconds()));
        self.offset = Some(offset);
        self
    }
}

/// Seconds of day of the jump input, with the notice to show when the input
/// is unusable.
pub fn parse_jump_time(text: &str) -> (u32, Option<Notice>) {
    let text = text.trim();
    if text.is_empty() {
        return (0, Some(Notice::EmptyJumpTime));
    }
    if parse_time(text).is_none() {
        return (0, Some(Notice::InvalidJumpTime));
    }
    (time_to_seconds(text), None)
}

/// Resolves the selected row of `table` to a seek position inside the video
/// bounded by `boundaries`.
pub fn plan_playback(
    table: &LogTable,
    boundaries: &BoundaryTimes,
    mut session: SessionContext,
) -> PlaybackPlan {
    session.apply_selection();
    let mut plan = PlaybackPlan::new(boundaries, session.clone());

    if table.is_empty() {
        plan.notice(Notice::CsvEmpty);
        return plan;
    }

    let Some(value) = session.value.as_deref() else {
        return plan;
    };
    let column = session
        .column
        .as_deref()
        .or_else(|| table.headers.first().map(String::as_str))
        .unwrap_or_default();

    let rows = table.matching_rows(column, value);
    plan.matched_rows = rows.iter().map(|row| row.to_vec()).collect();
    let Some(first) = rows.first() else {
        plan.notice(Notice::NoMatchingRow);
        return plan.play_from(SeekOffset::START);
    };

    let Some(date_time) = table.cell(first, DATE_TIME_COLUMN) else {
        plan.notice(Notice::MissingDateTimeColumn);
        return plan.play_from(SeekOffset::START);
    };

    let Some(token) = time_token(date_time) else {
        plan.notice(Notice::EmptyTimeString);
        return plan.play_from(SeekOffset::START);
    };

    let target = parse_time(token);
    if target.is_none() {
        plan.notice(Notice::TargetParseFailed);
    }

    let (Some(initial), Some(end)) = (boundaries.initial, boundaries.end) else {
        plan.notice(Notice::OutOfRange);
        return plan.play_from(SeekOffset::START);
    };

    let (jump_secs, jump_notice) = parse_jump_time(&session.jump_time);
    let outcome = compute_offset(&OffsetInputs {
        initial,
        end,
        target,
        jump_secs,
    });
    plan.duration_secs = Some(outcome.duration_secs);

    if outcome.has(OffsetCondition::OutOfRange) {
        plan.notice(Notice::OutOfRange);
        return plan.play_from(SeekOffset::START);
    }
    if let Some(notice) = jump_notice {
        plan.notice(notice);
    }

    tracing::info!(
        "Seeking to {:.0}s for {}={} (target {}, video {} - {})",
        outcome.offset.seconds(),
        column,
        value,
        token,
        initial,
        end
    );
    plan.play_from(outcome.offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
EVENT,ZONE,DATE AND TIME
arrival,A,2024-03-18 09:05:00 AM
arrival,B,2024-03-18 08:00:00
departure,A,2024-03-18 9h07
note,C,
";

    fn table() -> LogTable {
        LogTable::from_bytes(LOG.as_bytes()).unwrap()
    }

    fn boundaries(initial: &str, end: &str) -> BoundaryTimes {
        BoundaryTimes::from_texts(initial.to_string(), end.to_string())
    }

    fn nine_to_ten_past() -> BoundaryTimes {
        boundaries("09:00:00 AM", "09:10:00 AM")
    }

    #[test]
    fn test_nothing_selected() {
        let plan = plan_playback(&table(), &nine_to_ten_past(), SessionContext::default());
        assert!(plan.offset.is_none());
        assert!(plan.notices.is_empty());
        assert_eq!(plan.initial_time.as_deref(), Some("09:00:00"));
        assert_eq!(plan.end_time.as_deref(), Some("09:10:00"));
    }

    #[test]
    fn test_row_inside_video() {
        let table = LogTable::from_bytes(
            b"EVENT,DATE AND TIME\narrival,2024-03-18 09:05:00\n",
        )
        .unwrap();
        let plan = plan_playback(
            &table,
            &nine_to_ten_past(),
            SessionContext::select("EVENT", "arrival"),
        );
        assert_eq!(plan.offset.unwrap().seconds(), 300.0);
        assert_eq!(plan.offset_display.as_deref(), Some("0:05:00"));
        assert_eq!(plan.duration_secs, Some(600.0));
        assert!(plan.notices.is_empty());
        assert_eq!(plan.matched_rows.len(), 1);
    }

    #[test]
    fn test_first_matching_row_wins() {
        // The first "arrival" row ends in "AM", which is not a time on its own.
        let plan = plan_playback(
            &table(),
            &nine_to_ten_past(),
            SessionContext::select("EVENT", "arrival"),
        );
        assert_eq!(plan.matched_rows.len(), 2);
        assert!(plan.notices.contains(&Notice::TargetParseFailed));
        assert_eq!(plan.offset, Some(SeekOffset::START));
    }

    #[test]
    fn test_row_before_video_is_out_of_range() {
        let plan = plan_playback(
            &table(),
            &nine_to_ten_past(),
            SessionContext::select("ZONE", "B"),
        );
        assert_eq!(plan.notices, vec![Notice::OutOfRange]);
        assert_eq!(plan.offset, Some(SeekOffset::START));
        assert_eq!(
            plan.messages,
            vec!["Extracted time is out of the valid range. Playing from the start."]
        );
    }

    #[test]
    fn test_malformed_time_plays_from_start() {
        let plan = plan_playback(
            &table(),
            &nine_to_ten_past(),
            SessionContext::select("EVENT", "departure"),
        );
        assert_eq!(plan.notices, vec![Notice::TargetParseFailed]);
        assert_eq!(plan.offset, Some(SeekOffset::START));
    }

    #[test]
    fn test_empty_time_string() {
        let plan = plan_playback(
            &table(),
            &nine_to_ten_past(),
            SessionContext::select("ZONE", "C"),
        );
        assert_eq!(plan.notices, vec![Notice::EmptyTimeString]);
        assert_eq!(plan.offset, Some(SeekOffset::START));
    }

    #[test]
    fn test_no_matching_row() {
        let plan = plan_playback(
            &table(),
            &nine_to_ten_past(),
            SessionContext::select("ZONE", "Z"),
        );
        assert_eq!(plan.notices, vec![Notice::NoMatchingRow]);
        assert_eq!(plan.offset, Some(SeekOffset::START));
    }

    #[test]
    fn test_missing_date_time_column() {
        let table = LogTable::from_bytes(b"EVENT,WHEN\narrival,09:05:00\n").unwrap();
        let plan = plan_playback(
            &table,
            &nine_to_ten_past(),
            SessionContext::select("EVENT", "arrival"),
        );
        assert_eq!(plan.notices, vec![Notice::MissingDateTimeColumn]);
    }

    #[test]
    fn test_empty_csv_has_no_offset() {
        let table = LogTable::from_bytes(b"EVENT,DATE AND TIME\n").unwrap();
        let plan = plan_playback(
            &table,
            &nine_to_ten_past(),
            SessionContext::select("EVENT", "arrival"),
        );
        assert_eq!(plan.notices, vec![Notice::CsvEmpty]);
        assert!(plan.offset.is_none());
    }

    #[test]
    fn test_default_column_is_first() {
        let table = LogTable::from_bytes(
            b"EVENT,DATE AND TIME\narrival,2024-03-18 09:01:00\n",
        )
        .unwrap();
        let session = SessionContext {
            value: Some("arrival".to_string()),
            ..SessionContext::default()
        };
        let plan = plan_playback(&table, &nine_to_ten_past(), session);
        assert_eq!(plan.offset.unwrap().seconds(), 60.0);
    }

    #[test]
    fn test_jump_time_overrides_row() {
        let table = LogTable::from_bytes(
            b"EVENT,DATE AND TIME\narrival,2024-03-18 09:05:00\n",
        )
        .unwrap();
        let mut session = SessionContext::select("EVENT", "arrival");
        session.previous_value = Some("arrival".to_string());
        let session = session.with_jump_time("09:02:00");

        let plan = plan_playback(&table, &nine_to_ten_past(), session);
        assert_eq!(plan.offset.unwrap().seconds(), 120.0);
        assert_eq!(plan.session.jump_time, "09:02:00");
    }

    #[test]
    fn test_new_selection_resets_jump_time() {
        let table = LogTable::from_bytes(
            b"EVENT,DATE AND TIME\narrival,2024-03-18 09:05:00\n",
        )
        .unwrap();
        let mut session = SessionContext::select("EVENT", "arrival").with_jump_time("09:02:00");
        session.previous_value = Some("departure".to_string());

        let plan = plan_playback(&table, &nine_to_ten_past(), session);
        assert_eq!(plan.offset.unwrap().seconds(), 300.0);
        assert_eq!(plan.session.jump_time, DEFAULT_JUMP_TIME);
        assert_eq!(plan.session.previous_value.as_deref(), Some("arrival"));
    }

    #[test]
    fn test_bad_jump_time_notices() {
        let table = LogTable::from_bytes(
            b"EVENT,DATE AND TIME\narrival,2024-03-18 09:05:00\n",
        )
        .unwrap();
        for (jump, notice) in [("", Notice::EmptyJumpTime), ("soon", Notice::InvalidJumpTime)] {
            let mut session = SessionContext::select("EVENT", "arrival").with_jump_time(jump);
            session.previous_value = Some("arrival".to_string());
            let plan = plan_playback(&table, &nine_to_ten_past(), session);
            assert_eq!(plan.notices, vec![notice]);
            assert_eq!(plan.offset.unwrap().seconds(), 300.0);
        }
    }

    #[test]
    fn test_unparseable_boundary_is_out_of_range() {
        let table = LogTable::from_bytes(
            b"EVENT,DATE AND TIME\narrival,2024-03-18 09:05:00\n",
        )
        .unwrap();
        let plan = plan_playback(
            &table,
            &boundaries("13:00:00 PM", "09:10:00 AM"),
            SessionContext::select("EVENT", "arrival"),
        );
        assert_eq!(plan.notices, vec![Notice::OutOfRange]);
        assert!(plan.initial_time.is_none());
    }
}
