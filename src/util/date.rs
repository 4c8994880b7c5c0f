//! Calendar formatting helpers for posts and experience entries.

use time::{Date, format_description::FormatItem, macros::format_description};

use crate::domain::experience::MonthYear;

const LONG_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const SHORT_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none], [year]");
const LONG_MONTH_FORMAT: &[FormatItem<'static>] = format_description!("[month repr:long] [year]");
const SHORT_MONTH_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:short] [year]");

/// Presentation style for dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    /// `January 15, 2023`
    #[default]
    Long,
    /// `Jan 15, 2023`
    Short,
}

pub fn format_date(date: Date, style: DateStyle) -> String {
    let format = match style {
        DateStyle::Long => LONG_DATE_FORMAT,
        DateStyle::Short => SHORT_DATE_FORMAT,
    };
    date.format(format).unwrap_or_else(|_| date.to_string())
}

pub fn format_month_year(value: MonthYear, style: DateStyle) -> String {
    let format = match style {
        DateStyle::Long => LONG_MONTH_FORMAT,
        DateStyle::Short => SHORT_MONTH_FORMAT,
    };
    let first_day = value.first_day();
    first_day
        .format(format)
        .unwrap_or_else(|_| format!("{}-{:02}", value.year(), u8::from(value.month())))
}

/// Human-readable span between two months; a missing end means the role is ongoing.
pub fn calculate_duration(start: MonthYear, end: Option<MonthYear>, today: Date) -> String {
    let end = end.unwrap_or_else(|| MonthYear::from_date(today));
    let months = (end.ordinal() - start.ordinal()).abs();
    let years = months / 12;
    let remaining = months % 12;

    match (years, remaining) {
        (0, 0) => "Less than a month".to_string(),
        (0, months) => plural(months, "month"),
        (years, 0) => plural(years, "year"),
        (years, months) => format!("{} {}", plural(years, "year"), plural(months, "month")),
    }
}

/// Coarse relative phrasing used in post listings ("3 days ago").
pub fn relative_time(date: Date, today: Date) -> String {
    let days = (today - date).whole_days().max(0);

    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        7..=29 => format!("{} ago", plural(days / 7, "week")),
        30..=364 => format!("{} ago", plural(days / 30, "month")),
        _ => format!("{} ago", plural(days / 365, "year")),
    }
}

/// Age in completed years on `today`.
pub fn calculate_age(birth: Date, today: Date) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        age -= 1;
    }
    age
}

fn plural<N>(count: N, unit: &str) -> String
where
    N: Into<i64> + Copy,
{
    let value: i64 = count.into();
    if value == 1 {
        format!("{value} {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
