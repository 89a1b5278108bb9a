//! Calendar window classification relative to a reference date
//!
//! Everything here is a pure function of `(reference, date, week start)`.
//! The store only ever sees the resulting flags and labels.

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// First day of the to-date week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStart::Monday => "monday",
            WeekStart::Sunday => "sunday",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Some(WeekStart::Monday),
            "sunday" | "sun" => Some(WeekStart::Sunday),
            _ => None,
        }
    }

    /// Days elapsed since the start of the week containing `date`.
    fn days_into_week(&self, date: NaiveDate) -> i64 {
        let weekday = date.weekday();
        let days = match self {
            WeekStart::Monday => weekday.num_days_from_monday(),
            WeekStart::Sunday => weekday.num_days_from_sunday(),
        };
        i64::from(days)
    }
}

/// Periodic grouping granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKind {
    Yearly,
    Monthly,
    Weekly,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Yearly => "yearly",
            PeriodKind::Monthly => "monthly",
            PeriodKind::Weekly => "weekly",
        }
    }

    pub fn all() -> [PeriodKind; 3] {
        [PeriodKind::Yearly, PeriodKind::Monthly, PeriodKind::Weekly]
    }

    /// Sortable label of the period containing `date`.
    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            PeriodKind::Yearly => year_label(date),
            PeriodKind::Monthly => month_label(date),
            PeriodKind::Weekly => week_label(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDateError {
    pub value: String,
}

impl fmt::Display for InvalidDateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid calendar date '{}' (expected YYYY-MM-DD)", self.value)
    }
}

impl std::error::Error for InvalidDateError {}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, InvalidDateError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| InvalidDateError {
        value: value.to_string(),
    })
}

/// `YYYY`
pub fn year_label(date: NaiveDate) -> String {
    format!("{:04}", date.year())
}

/// `YYYY-MM`
pub fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Zero-based week of year with weeks starting Sunday; days before the
/// year's first Sunday are week 0 (same numbering as `strftime("%U")`).
pub fn sunday_week_of_year(date: NaiveDate) -> u32 {
    (date.ordinal0() + 7 - date.weekday().num_days_from_sunday()) / 7
}

/// `YYYY-WW`, see [`sunday_week_of_year`].
pub fn week_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), sunday_week_of_year(date))
}

/// Window membership and period labels of one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBucket {
    pub ytd: bool,
    pub mtd: bool,
    pub wtd: bool,
    pub year: String,
    pub month: String,
    pub week: String,
}

impl WindowBucket {
    pub fn period_label(&self, kind: PeriodKind) -> &str {
        match kind {
            PeriodKind::Yearly => &self.year,
            PeriodKind::Monthly => &self.month,
            PeriodKind::Weekly => &self.week,
        }
    }
}

/// Classifies dates against a fixed reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowClassifier {
    reference: NaiveDate,
    week_start: WeekStart,
    year_start: NaiveDate,
    wtd_start: NaiveDate,
}

impl WindowClassifier {
    pub fn new(reference: NaiveDate, week_start: WeekStart) -> Self {
        // Jan 1 always exists, with_ordinal(1) cannot fail
        let year_start = reference.with_ordinal(1).unwrap_or(reference);
        let wtd_start = reference - Duration::days(week_start.days_into_week(reference));

        Self {
            reference,
            week_start,
            year_start,
            wtd_start,
        }
    }

    pub fn parse(reference: &str, week_start: WeekStart) -> Result<Self, InvalidDateError> {
        Ok(Self::new(parse_date(reference)?, week_start))
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    /// First day of the week-to-date window.
    pub fn week_to_date_start(&self) -> NaiveDate {
        self.wtd_start
    }

    /// `[Jan 1 of reference year, reference]`
    pub fn is_year_to_date(&self, date: NaiveDate) -> bool {
        self.year_start <= date && date <= self.reference
    }

    /// Same calendar month as the reference; not bounded by day.
    pub fn is_month_to_date(&self, date: NaiveDate) -> bool {
        date.year() == self.reference.year() && date.month() == self.reference.month()
    }

    /// `[start of reference week, reference]`
    pub fn is_week_to_date(&self, date: NaiveDate) -> bool {
        self.wtd_start <= date && date <= self.reference
    }

    pub fn classify(&self, date: NaiveDate) -> WindowBucket {
        WindowBucket {
            ytd: self.is_year_to_date(date),
            mtd: self.is_month_to_date(date),
            wtd: self.is_week_to_date(date),
            year: year_label(date),
            month: month_label(date),
            week: week_label(date),
        }
    }

    pub fn classify_str(&self, date: &str) -> Result<WindowBucket, InvalidDateError> {
        Ok(self.classify(parse_date(date)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn classifier(reference: &str, week_start: WeekStart) -> WindowClassifier {
        WindowClassifier::parse(reference, week_start).unwrap()
    }

    #[test]
    fn test_ytd_boundary() {
        let c = classifier("2023-02-14", WeekStart::Monday);
        assert!(c.is_year_to_date(d("2023-01-01")));
        assert!(c.is_year_to_date(d("2023-02-14")));
        assert!(!c.is_year_to_date(d("2022-12-31")));
        assert!(!c.is_year_to_date(d("2023-02-15")));
    }

    #[test]
    fn test_wtd_boundary_monday_start() {
        // 2023-02-14 is a Tuesday
        let c = classifier("2023-02-14", WeekStart::Monday);
        assert_eq!(c.week_to_date_start(), d("2023-02-13"));
        assert!(c.is_week_to_date(d("2023-02-13")));
        assert!(c.is_week_to_date(d("2023-02-14")));
        assert!(!c.is_week_to_date(d("2023-02-12")));
        assert!(!c.is_week_to_date(d("2023-02-06")));
        assert!(!c.is_week_to_date(d("2023-02-15")));
    }

    #[test]
    fn test_wtd_boundary_sunday_start() {
        let c = classifier("2023-02-14", WeekStart::Sunday);
        assert_eq!(c.week_to_date_start(), d("2023-02-12"));
        assert!(c.is_week_to_date(d("2023-02-12")));
        assert!(!c.is_week_to_date(d("2023-02-11")));
    }

    #[test]
    fn test_wtd_on_week_start_day_is_single_day() {
        // Monday reference: the window is just that Monday
        let c = classifier("2023-02-13", WeekStart::Monday);
        assert_eq!(c.week_to_date_start(), d("2023-02-13"));
        assert!(!c.is_week_to_date(d("2023-02-06")));
        assert!(!c.is_week_to_date(d("2023-02-12")));

        let c = classifier("2023-02-12", WeekStart::Sunday);
        assert_eq!(c.week_to_date_start(), d("2023-02-12"));
    }

    #[test]
    fn test_wtd_crosses_year_boundary() {
        // 2023-01-01 is a Sunday, its Monday-start week began 2022-12-26
        let c = classifier("2023-01-01", WeekStart::Monday);
        assert_eq!(c.week_to_date_start(), d("2022-12-26"));
        assert!(c.is_week_to_date(d("2022-12-28")));
        assert!(!c.is_year_to_date(d("2022-12-28")));
    }

    #[test]
    fn test_mtd_is_calendar_month_membership() {
        let c = classifier("2023-02-14", WeekStart::Monday);
        assert!(c.is_month_to_date(d("2023-02-01")));
        // not bounded by the reference day
        assert!(c.is_month_to_date(d("2023-02-28")));
        assert!(!c.is_month_to_date(d("2023-01-31")));
        assert!(!c.is_month_to_date(d("2022-02-14")));
    }

    #[test]
    fn test_period_labels() {
        let date = d("2023-02-14");
        assert_eq!(year_label(date), "2023");
        assert_eq!(month_label(date), "2023-02");
        assert_eq!(week_label(date), "2023-07");
        assert_eq!(PeriodKind::Weekly.label(date), "2023-07");
    }

    #[test]
    fn test_sunday_week_numbering() {
        // 2023 starts on a Sunday: Jan 1 opens week 1
        assert_eq!(sunday_week_of_year(d("2023-01-01")), 1);
        assert_eq!(sunday_week_of_year(d("2023-01-07")), 1);
        assert_eq!(sunday_week_of_year(d("2023-01-08")), 2);
        // 2022 starts on a Saturday: Jan 1 is week 0, Jan 2 (Sunday) week 1
        assert_eq!(sunday_week_of_year(d("2022-01-01")), 0);
        assert_eq!(sunday_week_of_year(d("2022-01-02")), 1);
        assert_eq!(sunday_week_of_year(d("2022-12-31")), 52);
    }

    #[test]
    fn test_week_label_matches_strftime_u() {
        let mut date = d("2020-01-01");
        while date <= d("2024-12-31") {
            assert_eq!(week_label(date), date.format("%Y-%U").to_string(), "{}", date);
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_classify_bucket() {
        let c = classifier("2023-02-14", WeekStart::Monday);
        let bucket = c.classify_str("2023-01-03").unwrap();
        assert!(bucket.ytd);
        assert!(!bucket.mtd);
        assert!(!bucket.wtd);
        assert_eq!(bucket.period_label(PeriodKind::Yearly), "2023");
        assert_eq!(bucket.period_label(PeriodKind::Monthly), "2023-01");
        assert_eq!(bucket.period_label(PeriodKind::Weekly), "2023-01");
    }

    #[test]
    fn test_invalid_dates() {
        assert!(WindowClassifier::parse("2023-02-30", WeekStart::Monday).is_err());
        let c = classifier("2023-02-14", WeekStart::Monday);
        let err = c.classify_str("14/02/2023").unwrap_err();
        assert_eq!(err.value, "14/02/2023");
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_week_start_parsing() {
        assert_eq!(WeekStart::from_str("Monday"), Some(WeekStart::Monday));
        assert_eq!(WeekStart::from_str(" sun "), Some(WeekStart::Sunday));
        assert_eq!(WeekStart::from_str("friday"), None);
        assert_eq!(WeekStart::default(), WeekStart::Monday);
    }
}
