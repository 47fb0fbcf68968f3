//! Event log records and per-lane watermarks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::status::StatusCode;

/// The three lanes of the job event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Warn,
    Finish,
}

/// A single record from the durable event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Lane-local identifier, strictly increasing within its lane.
    pub id: i64,
    pub job_id: JobId,
    pub kind: EventKind,
    /// Outcome code carried by the event, if any. Start events carry none.
    pub status: Option<StatusCode>,
    pub datetime: DateTime<Utc>,
}

/// Highest event id seen so far in each lane.
///
/// Lanes advance independently and never move backwards. A reader holding
/// a `Watermarks` from an earlier snapshot can tell whether anything new
/// has arrived with [`any_ahead_of`](Watermarks::any_ahead_of).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermarks {
    pub start: i64,
    pub warn: i64,
    pub finish: i64,
}

impl Watermarks {
    /// Advance the event's lane to its id, if higher.
    ///
    /// Duplicate and out-of-order ids are tolerated; a lane never decreases.
    pub fn observe(&mut self, event: &JobEvent) {
        let lane = match event.kind {
            EventKind::Start => &mut self.start,
            EventKind::Warn => &mut self.warn,
            EventKind::Finish => &mut self.finish,
        };
        if event.id > *lane {
            *lane = event.id;
        }
    }

    /// Whether any lane here is strictly ahead of `seen`.
    pub fn any_ahead_of(&self, seen: &Watermarks) -> bool {
        self.start > seen.start || self.warn > seen.warn || self.finish > seen.finish
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn event(id: i64, kind: EventKind) -> JobEvent {
        JobEvent {
            id,
            job_id: 1,
            kind,
            status: None,
            datetime: Utc::now(),
        }
    }

    #[test]
    fn observe_tracks_lanes_independently() {
        let mut marks = Watermarks::default();
        marks.observe(&event(4, EventKind::Start));
        marks.observe(&event(9, EventKind::Finish));
        assert_eq!(marks.start, 4);
        assert_eq!(marks.warn, 0);
        assert_eq!(marks.finish, 9);
    }

    #[test]
    fn observe_never_decreases() {
        let mut marks = Watermarks::default();
        marks.observe(&event(5, EventKind::Warn));
        marks.observe(&event(3, EventKind::Warn));
        marks.observe(&event(5, EventKind::Warn));
        assert_eq!(marks.warn, 5);
    }

    #[test]
    fn any_ahead_of_compares_per_lane() {
        let seen = Watermarks {
            start: 2,
            warn: 7,
            finish: 4,
        };
        assert!(!seen.any_ahead_of(&seen));

        let mut ahead = seen;
        ahead.finish = 5;
        assert!(ahead.any_ahead_of(&seen));

        let mut behind = seen;
        behind.warn = 1;
        assert!(!behind.any_ahead_of(&seen));
        assert!(seen.any_ahead_of(&behind));
    }
}
