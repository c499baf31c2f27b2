//! Academic calendar: which term a date belongs to, and which date of a
//! result counts.
//!
//! Week mode follows ISO 8601 week numbering. The autumn term (HT) runs from
//! the configured start week to the end of ISO week 3 of the following year,
//! the spring term (VT) from ISO week 4 onwards. Spring ends in the ISO week
//! containing June 7; the weeks after that up to the autumn start are either
//! folded into spring or reported as a summer bucket.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;

use crate::config::{Config, DateBasis, TermBoundaryMode};
use crate::models::GradeResult;

const AUTUMN_LAST_WEEK: u32 = 3;
const SPRING_FIRST_WEEK: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermKind {
    Autumn,
    Spring,
    Summer,
}

impl TermKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            TermKind::Autumn => "HT",
            TermKind::Spring => "VT",
            TermKind::Summer => "Sommar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermRange {
    pub label: String,
    pub kind: TermKind,
    pub year: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TermRange {
    fn new(kind: TermKind, year: i32, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: format!("{} {}", year, kind.suffix()),
            kind,
            year,
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Reads the leading `YYYY-MM-DD` of an ISO date or datetime string.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let head = text.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// The authoritative date of a result under the configured basis.
pub fn result_date(result: &GradeResult, basis: DateBasis) -> Option<NaiveDate> {
    let exam = result.exam_date.as_deref().and_then(parse_date);
    let decision = result.decision_date.as_deref().and_then(parse_date);
    match basis {
        DateBasis::Decision => decision.or(exam),
        DateBasis::Exam | DateBasis::Auto => exam.or(decision),
    }
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn weeks_in_iso_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 28)
        .map(|d| d.iso_week().week())
        .unwrap_or(52)
}

/// Monday of the given ISO week; weeks past the end of the year clamp to its last week.
fn week_start(year: i32, week: u32, fallback: NaiveDate) -> NaiveDate {
    let week = week.clamp(1, weeks_in_iso_year(year));
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).unwrap_or(fallback)
}

/// Sunday of the given ISO week.
fn week_end(year: i32, week: u32, fallback: NaiveDate) -> NaiveDate {
    let monday = week_start(year, week, fallback);
    monday.checked_add_days(Days::new(6)).unwrap_or(monday)
}

/// ISO week in which the spring term of `year` ends (the week holding June 7).
pub fn spring_end_week(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 6, 7)
        .map(|d| d.iso_week().week())
        .unwrap_or(23)
}

pub fn term_range_of(date: NaiveDate, config: &Config) -> TermRange {
    match config.term_boundary_mode {
        TermBoundaryMode::Week => week_term(date, config),
        TermBoundaryMode::Fixed => fixed_term(date, config),
    }
}

fn week_term(date: NaiveDate, config: &Config) -> TermRange {
    let iso = date.iso_week();
    let (year, week) = (iso.year(), iso.week());
    let start_week = config.academic_year_start_week.clamp(1, 53);

    if week >= start_week || week <= AUTUMN_LAST_WEEK {
        let anchor = if week <= AUTUMN_LAST_WEEK && week < start_week {
            year - 1
        } else {
            year
        };
        return TermRange::new(
            TermKind::Autumn,
            anchor,
            week_start(anchor, start_week, date),
            week_end(anchor + 1, AUTUMN_LAST_WEEK, date),
        );
    }

    let last_spring_week = start_week.saturating_sub(1).max(SPRING_FIRST_WEEK);
    let spring_end = spring_end_week(year).min(last_spring_week);

    if !config.include_summer_weeks && week > spring_end && week < start_week {
        return TermRange::new(
            TermKind::Summer,
            year,
            week_start(year, spring_end + 1, date),
            week_end(year, last_spring_week, date),
        );
    }

    let end_week = if config.include_summer_weeks {
        last_spring_week
    } else {
        spring_end
    };
    TermRange::new(
        TermKind::Spring,
        year,
        week_start(year, SPRING_FIRST_WEEK, date),
        week_end(year, end_week, date),
    )
}

fn fixed_term(date: NaiveDate, config: &Config) -> TermRange {
    let year = date.year();
    let ymd = |y: i32, m: u32, d: u32| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(date);
    let autumn = |y: i32| TermRange::new(TermKind::Autumn, y, ymd(y, 9, 1), ymd(y + 1, 1, 18));

    if date >= ymd(year, 9, 1) {
        return autumn(year);
    }
    if date <= ymd(year, 1, 18) {
        return autumn(year - 1);
    }

    let spring_end = if config.include_summer_weeks {
        ymd(year, 8, 31)
    } else {
        ymd(year, 6, 7)
    };
    if date <= spring_end {
        return TermRange::new(TermKind::Spring, year, ymd(year, 1, 19), spring_end);
    }

    // Between spring end and September with summer excluded.
    autumn(year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn week_config(include_summer_weeks: bool) -> Config {
        Config {
            term_boundary_mode: TermBoundaryMode::Week,
            academic_year_start_week: 36,
            include_summer_weeks,
            ..Config::default()
        }
    }

    fn fixed_config(include_summer_weeks: bool) -> Config {
        Config {
            term_boundary_mode: TermBoundaryMode::Fixed,
            include_summer_weeks,
            ..Config::default()
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_dates_and_datetimes() {
            assert_eq!(parse_date("2024-10-15"), Some(date("2024-10-15")));
            assert_eq!(parse_date("2024-10-15T08:30:00+02:00"), Some(date("2024-10-15")));
            assert_eq!(parse_date(" 2024-10-15 "), Some(date("2024-10-15")));
        }

        #[test]
        fn rejects_garbage() {
            assert_eq!(parse_date(""), None);
            assert_eq!(parse_date("2024-13-01"), None);
            assert_eq!(parse_date("15/10/2024"), None);
            assert_eq!(parse_date("2024"), None);
        }

        #[test]
        fn month_helpers() {
            assert_eq!(month_key(date("2024-03-09")), "2024-03");
            assert_eq!(month_start(date("2024-03-09")), date("2024-03-01"));
        }
    }

    mod date_basis_tests {
        use super::*;

        fn result(exam: Option<&str>, decision: Option<&str>) -> GradeResult {
            GradeResult {
                grade: Some("G".to_string()),
                exam_date: exam.map(String::from),
                decision_date: decision.map(String::from),
            }
        }

        #[test]
        fn exam_prefers_exam_date() {
            let r = result(Some("2024-01-10"), Some("2024-01-20"));
            assert_eq!(result_date(&r, DateBasis::Exam), Some(date("2024-01-10")));
            assert_eq!(result_date(&r, DateBasis::Auto), Some(date("2024-01-10")));
        }

        #[test]
        fn decision_prefers_decision_date() {
            let r = result(Some("2024-01-10"), Some("2024-01-20"));
            assert_eq!(result_date(&r, DateBasis::Decision), Some(date("2024-01-20")));
        }

        #[test]
        fn falls_back_to_the_other_date() {
            let exam_only = result(Some("2024-01-10"), None);
            assert_eq!(result_date(&exam_only, DateBasis::Decision), Some(date("2024-01-10")));

            let decision_only = result(None, Some("2024-01-20"));
            assert_eq!(result_date(&decision_only, DateBasis::Exam), Some(date("2024-01-20")));
            assert_eq!(result_date(&decision_only, DateBasis::Auto), Some(date("2024-01-20")));
        }

        #[test]
        fn unparseable_dates_count_as_absent() {
            let r = result(Some("soon"), Some("2024-01-20"));
            assert_eq!(result_date(&r, DateBasis::Exam), Some(date("2024-01-20")));
            assert_eq!(result_date(&result(None, None), DateBasis::Auto), None);
        }
    }

    mod week_mode_tests {
        use super::*;

        #[test]
        fn october_is_autumn_of_same_year() {
            let term = term_range_of(date("2024-10-15"), &week_config(true));
            assert_eq!(term.label, "2024 HT");
            assert_eq!(term.kind, TermKind::Autumn);
            assert_eq!(term.start, date("2024-09-02"));
            assert_eq!(term.end, date("2025-01-19"));
        }

        #[test]
        fn early_january_belongs_to_previous_autumn() {
            let term = term_range_of(date("2025-01-15"), &week_config(true));
            assert_eq!(term.label, "2024 HT");
            assert!(term.contains(date("2025-01-15")));
        }

        #[test]
        fn iso_year_boundaries() {
            // ISO week 1 of 2025 starts on Monday 2024-12-30.
            assert_eq!(term_range_of(date("2024-12-30"), &week_config(true)).label, "2024 HT");
            // 2021-01-01 is in ISO week 53 of 2020.
            let term = term_range_of(date("2021-01-01"), &week_config(true));
            assert_eq!(term.label, "2020 HT");
            assert!(term.contains(date("2021-01-01")));
        }

        #[test]
        fn spring_with_summer_included() {
            let term = term_range_of(date("2025-03-10"), &week_config(true));
            assert_eq!(term.label, "2025 VT");
            assert_eq!(term.start, date("2025-01-20"));
            assert_eq!(term.end, date("2025-08-31"));

            let summer_day = term_range_of(date("2025-07-01"), &week_config(true));
            assert_eq!(summer_day, term);
        }

        #[test]
        fn spring_with_summer_excluded_ends_in_june() {
            let term = term_range_of(date("2025-03-10"), &week_config(false));
            assert_eq!(term.label, "2025 VT");
            assert_eq!(term.start, date("2025-01-20"));
            assert_eq!(term.end, date("2025-06-08"));
        }

        #[test]
        fn summer_bucket_when_excluded() {
            assert_eq!(spring_end_week(2024), 23);
            // 2024-06-19 is in ISO week 25.
            let term = term_range_of(date("2024-06-19"), &week_config(false));
            assert_eq!(term.label, "2024 Sommar");
            assert_eq!(term.kind, TermKind::Summer);
            assert_eq!(term.start, date("2024-06-10"));
            assert_eq!(term.end, date("2024-09-01"));
        }

        #[test]
        fn spring_end_week_itself_stays_in_spring() {
            // 2024-06-07 is in ISO week 23.
            let term = term_range_of(date("2024-06-07"), &week_config(false));
            assert_eq!(term.label, "2024 VT");
        }

        #[test]
        fn custom_start_week() {
            let cfg = Config {
                academic_year_start_week: 35,
                ..week_config(true)
            };
            // 2024-08-28 is in ISO week 35.
            let term = term_range_of(date("2024-08-28"), &cfg);
            assert_eq!(term.label, "2024 HT");
            assert_eq!(term.start, date("2024-08-26"));
        }

        #[test]
        fn every_day_lies_in_its_term() {
            for include in [true, false] {
                let cfg = week_config(include);
                let mut day = date("2023-01-01");
                while day <= date("2026-12-31") {
                    let term = term_range_of(day, &cfg);
                    assert!(term.contains(day), "{} not in {:?}", day, term);
                    day = day.succ_opt().unwrap();
                }
            }
        }
    }

    mod fixed_mode_tests {
        use super::*;

        #[test]
        fn autumn_range() {
            let term = term_range_of(date("2024-10-15"), &fixed_config(false));
            assert_eq!(term.label, "2024 HT");
            assert_eq!(term.start, date("2024-09-01"));
            assert_eq!(term.end, date("2025-01-18"));
        }

        #[test]
        fn january_before_the_19th_is_previous_autumn() {
            let term = term_range_of(date("2025-01-18"), &fixed_config(false));
            assert_eq!(term.label, "2024 HT");
        }

        #[test]
        fn spring_range_depends_on_summer() {
            let excluded = term_range_of(date("2025-01-19"), &fixed_config(false));
            assert_eq!(excluded.label, "2025 VT");
            assert_eq!(excluded.end, date("2025-06-07"));

            let included = term_range_of(date("2025-08-31"), &fixed_config(true));
            assert_eq!(included.label, "2025 VT");
            assert_eq!(included.end, date("2025-08-31"));
        }

        #[test]
        fn summer_gap_defaults_to_own_year_autumn() {
            let term = term_range_of(date("2025-07-01"), &fixed_config(false));
            assert_eq!(term.label, "2025 HT");
            assert_eq!(term.start, date("2025-09-01"));
        }
    }
}
