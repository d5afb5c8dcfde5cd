//! Folder names for date groups.

use crate::model::DateFormat;
use chrono::{Datelike, NaiveDate};

/// Map a calendar day to its canonical folder name.
///
/// Every field is zero-padded (the year to four digits), so the result only
/// ever contains ASCII digits and hyphens and is a valid path component on
/// every target filesystem.
pub fn folder_name(date: NaiveDate, format: DateFormat) -> String {
    let (year, month, day) = (date.year(), date.month(), date.day());
    match format {
        DateFormat::DayMonthYear => format!("{:02}-{:02}-{:04}", day, month, year),
        DateFormat::MonthDayYear => format!("{:02}-{:02}-{:04}", month, day, year),
        DateFormat::YearMonthDay => format!("{:04}-{:02}-{:02}", year, month, day),
    }
}

impl DateFormat {
    pub fn folder_name(self, date: NaiveDate) -> String {
        folder_name(date, self)
    }
}
