//! Professional experience records and the aggregate figures shown on the home page.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use super::error::DomainError;

/// A calendar month, the granularity at which roles are dated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMonthYear", into = "RawMonthYear")]
pub struct MonthYear {
    year: i32,
    /// 1-based, validated on construction.
    month: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawMonthYear {
    month: u8,
    year: i32,
}

impl TryFrom<RawMonthYear> for MonthYear {
    type Error = DomainError;

    fn try_from(raw: RawMonthYear) -> Result<Self, Self::Error> {
        MonthYear::new(raw.month, raw.year)
    }
}

impl From<MonthYear> for RawMonthYear {
    fn from(value: MonthYear) -> Self {
        Self {
            month: value.month,
            year: value.year,
        }
    }
}

impl MonthYear {
    /// `month` is 1-based.
    pub fn new(month: u8, year: i32) -> Result<Self, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!(
                "month {month} is not in 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        Month::try_from(self.month).unwrap_or(Month::January)
    }

    /// Months elapsed since year zero; differences give calendar-month spans.
    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> Date {
        Date::from_calendar_date(self.year, self.month(), 1).unwrap_or(Date::MIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorType {
    Primary,
    Secondary,
    Tertiary,
}

impl ColorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorType::Primary => "primary",
            ColorType::Secondary => "secondary",
            ColorType::Tertiary => "tertiary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationType {
    Remote,
    OnSite,
    Hybrid,
}

impl LocationType {
    pub fn label(&self) -> &'static str {
        match self {
            LocationType::Remote => "Remote",
            LocationType::OnSite => "On-site",
            LocationType::Hybrid => "Hybrid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
    #[serde(rename = "color")]
    pub color_type: ColorType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub quote: String,
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub date: Option<MonthYear>,
    #[serde(default)]
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub start: MonthYear,
    #[serde(default)]
    pub end: Option<MonthYear>,
    pub location: LocationType,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub testimonial: Option<Testimonial>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

impl Experience {
    pub fn is_current(&self) -> bool {
        self.end.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() || self.company.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "experience `{}` needs a title and a company",
                self.id
            )));
        }
        if self.end.is_some_and(|end| end < self.start) {
            return Err(DomainError::validation(format!(
                "experience `{}` ends before it starts",
                self.id
            )));
        }
        let rating = self.testimonial.as_ref().and_then(|t| t.rating);
        if let Some(rating) = rating.filter(|rating| !(1..=5).contains(rating)) {
            return Err(DomainError::validation(format!(
                "experience `{}` has a testimonial rating of {rating}, expected 1..=5",
                self.id
            )));
        }
        Ok(())
    }
}

/// Wrapper matching the layout of `experiences.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperienceFile {
    #[serde(default, rename = "experience")]
    pub experiences: Vec<Experience>,
}

/// Aggregate career figures.
///
/// Months are counted once even when roles overlap, both ends inclusive, and
/// ongoing roles run through the month of `today`. Progress towards the next
/// full year is the share of the current partial year already worked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperienceSummary {
    pub total_months: u32,
    pub years: u32,
    pub progress_to_next_year: f64,
    pub current_role: Option<String>,
    pub technologies: Vec<String>,
}

impl ExperienceSummary {
    pub fn compute(experiences: &[Experience], today: Date) -> Self {
        let current_month = MonthYear::from_date(today);
        let mut months_worked: HashSet<MonthYear> = HashSet::new();

        for experience in experiences {
            let end = experience.end.unwrap_or(current_month).min(current_month);
            let mut cursor = experience.start;
            while cursor <= end {
                months_worked.insert(cursor);
                cursor = cursor.next();
            }
        }

        let total_months = u32::try_from(months_worked.len()).unwrap_or(u32::MAX);
        let years = total_months / 12;
        let progress = f64::from(total_months % 12) / 12.0 * 100.0;
        let progress_to_next_year = (progress * 10.0).round() / 10.0;

        let current_role = experiences
            .iter()
            .find(|experience| experience.is_current())
            .map(|experience| format!("{} @ {}", experience.title, experience.company));

        let technologies = experiences
            .iter()
            .flat_map(|experience| experience.technologies.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            total_months,
            years,
            progress_to_next_year,
            current_role,
            technologies,
        }
    }
}
