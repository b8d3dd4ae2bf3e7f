//! Workout history for the calendar view
//!
//! Read-only sample data plus the per-day markers the calendar renders.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a planned workout went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkoutStatus {
    Done,
    PartialDone,
    Missed,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub title: String,
    pub status: Option<WorkoutStatus>,
}

/// One day of training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub date: NaiveDate,
    pub status: WorkoutStatus,
    pub exercises: Vec<Exercise>,
}

/// Calendar marker for a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayMark {
    pub status: Option<WorkoutStatus>,
    /// Nothing to show for this day
    pub disabled: bool,
    pub today: bool,
}

type SampleDay = (
    (i32, u32, u32),
    WorkoutStatus,
    &'static [(&'static str, Option<WorkoutStatus>)],
);

const SAMPLE_DAYS: &[SampleDay] = &[
    (
        (2025, 8, 25),
        WorkoutStatus::Done,
        &[("Ex 1", None), ("Ex 2", None), ("Ex 3", None), ("Ex 4", None)],
    ),
    (
        (2025, 8, 12),
        WorkoutStatus::PartialDone,
        &[
            ("Ex 5", Some(WorkoutStatus::Done)),
            ("Ex 6", Some(WorkoutStatus::Done)),
            ("Ex 7", Some(WorkoutStatus::Missed)),
            ("Ex 8", Some(WorkoutStatus::Done)),
            ("Ex 9", Some(WorkoutStatus::Missed)),
        ],
    ),
    (
        (2025, 8, 14),
        WorkoutStatus::PartialDone,
        &[
            ("Ex 115", Some(WorkoutStatus::Done)),
            ("Ex 116", Some(WorkoutStatus::Done)),
            ("Ex 117", Some(WorkoutStatus::Missed)),
            ("Ex 118", Some(WorkoutStatus::Done)),
            ("Ex 119", Some(WorkoutStatus::Missed)),
        ],
    ),
    (
        (2025, 8, 7),
        WorkoutStatus::Missed,
        &[("Ex 10", None), ("Ex 11", None), ("Ex 12", None), ("Ex 13", None)],
    ),
    (
        (2025, 8, 15),
        WorkoutStatus::Changed,
        &[
            ("Ex 14", Some(WorkoutStatus::Changed)),
            ("Ex 15", Some(WorkoutStatus::Done)),
            ("Ex 16", Some(WorkoutStatus::Done)),
            ("Ex 17", Some(WorkoutStatus::Done)),
        ],
    ),
];

/// The fixed workout history
pub fn sample_workouts() -> Vec<WorkoutRecord> {
    SAMPLE_DAYS
        .iter()
        .filter_map(|&((year, month, day), status, exercises)| {
            Some(WorkoutRecord {
                date: NaiveDate::from_ymd_opt(year, month, day)?,
                status,
                exercises: exercises
                    .iter()
                    .map(|&(title, status)| Exercise {
                        title: title.to_string(),
                        status,
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Calendar markers: days with exercises carry their status, days without
/// are disabled, and `today` is always present
pub fn marked_dates(records: &[WorkoutRecord], today: NaiveDate) -> BTreeMap<NaiveDate, DayMark> {
    let mut marks: BTreeMap<NaiveDate, DayMark> = records
        .iter()
        .map(|record| {
            let mark = if record.exercises.is_empty() {
                DayMark {
                    disabled: true,
                    ..Default::default()
                }
            } else {
                DayMark {
                    status: Some(record.status),
                    ..Default::default()
                }
            };
            (record.date, mark)
        })
        .collect();

    marks.entry(today).or_default().today = true;
    marks
}
