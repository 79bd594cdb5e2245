use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::normalize_text;

pub const START_DATE_KEY: &str = "startDate";
pub const END_DATE_KEY: &str = "endDate";
pub const EXAM_TITLE_KEY: &str = "examTitle";
pub const DIRECTION_KEY: &str = "direction";

/// Extra string fields merged into every stored record.
/// Also used as an equality filter when replacing part of a collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// True when every field of `filter` is present here with the same value.
    pub fn contains(&self, filter: &Metadata) -> bool {
        filter
            .0
            .iter()
            .all(|(key, value)| self.0.get(key) == Some(value))
    }

    /// True when `endDate` holds a valid date before `today`. Without one a record never expires.
    pub fn ended_before(&self, today: NaiveDate) -> bool {
        self.get(END_DATE_KEY)
            .is_some_and(|end_date| end_date_passed(end_date, today))
    }
}

/// `end_date` must be a real `YYYY-MM-DD` date, `2025-02-30` doesn't count.
pub fn end_date_passed(end_date: &str, today: NaiveDate) -> bool {
    NaiveDate::parse_from_str(end_date, "%Y-%m-%d").is_ok_and(|end_date| end_date < today)
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Metadata(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The flat record handed to a record sink
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub code: String,
    pub stops: Vec<String>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl OutputRecord {
    /// Whether one of the stops contains `stop`, ignoring case.
    pub fn serves(&self, stop: &str) -> bool {
        let stop = normalize_text(stop);
        self.stops
            .iter()
            .any(|entry| entry.to_lowercase().contains(&stop))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// The schedule of exam buses for one direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExamDetails {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub exam_title: String,
    pub direction: Direction,
}

impl ExamDetails {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        exam_title: &str,
        direction: Direction,
    ) -> Result<Self, ExamDetailsError> {
        let exam_title = exam_title.trim();
        if exam_title.is_empty() {
            return Err(ExamDetailsError::MissingTitle);
        }
        if end_date < start_date {
            return Err(ExamDetailsError::EndsBeforeStart {
                start_date,
                end_date,
            });
        }

        Ok(ExamDetails {
            start_date,
            end_date,
            exam_title: exam_title.to_string(),
            direction,
        })
    }

    /// Fields stored with every route of this exam
    pub fn metadata(&self) -> Metadata {
        Metadata::new()
            .with(START_DATE_KEY, self.start_date.format("%Y-%m-%d").to_string())
            .with(END_DATE_KEY, self.end_date.format("%Y-%m-%d").to_string())
            .with(EXAM_TITLE_KEY, self.exam_title.as_str())
            .with(DIRECTION_KEY, self.direction.as_str())
    }

    /// Uploading an exam only replaces the routes of the same exam and direction.
    pub fn refresh_filter(&self) -> Metadata {
        Metadata::new()
            .with(EXAM_TITLE_KEY, self.exam_title.as_str())
            .with(DIRECTION_KEY, self.direction.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ExamDetailsError {
    #[error("the exam title is empty")]
    MissingTitle,

    #[error("the exam ends ({end_date}) before it starts ({start_date})")]
    EndsBeforeStart {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}
