use chrono::{Datelike, NaiveDate, Weekday};

use crate::data::Slot;

/// Candidate exam slots in deterministic order, weekends skipped.
#[derive(Debug, Clone)]
pub struct SlotCalendar<'a> {
    start: NaiveDate,
    time_labels: &'a [String],
    max_dates: u32,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl<'a> SlotCalendar<'a> {
    pub fn new(start: NaiveDate, time_labels: &'a [String], max_dates: u32) -> Self {
        Self {
            start,
            time_labels,
            max_dates,
        }
    }

    pub fn time_labels(&self) -> &'a [String] {
        self.time_labels
    }

    pub fn max_dates(&self) -> u32 {
        self.max_dates
    }

    /// Weekday dates from the start date on, at most `max_dates` of them.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        std::iter::successors(Some(self.start), |date| date.succ_opt())
            .filter(|date| !is_weekend(*date))
            .take(self.max_dates as usize)
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> + use<'a> {
        let labels = self.time_labels;
        self.dates()
            .flat_map(move |date| labels.iter().map(move |label| Slot::new(date, label.as_str())))
    }
}
