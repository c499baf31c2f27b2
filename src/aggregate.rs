//! Time-bucketed credit statistics over the whole course store.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{month_key, month_start, parse_date, result_date, term_range_of, TermRange};
use crate::config::Config;
use crate::models::{usable_credits, CourseRecord, Module};
use crate::store::CourseMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPoint {
    pub key: String,
    pub date: NaiveDate,
    pub credits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativePoint {
    pub key: String,
    pub date: NaiveDate,
    pub credits: f64,
    pub module_count: usize,
    pub cumulative_credits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermPoint {
    pub label: String,
    /// First day of the term.
    pub date: NaiveDate,
    pub end: NaiveDate,
    pub credits: f64,
    pub module_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub course_count: usize,
    pub modules_total: usize,
    pub modules_passed: usize,
    pub has_data: bool,
    pub total_credits: f64,
    pub month_series: Vec<MonthPoint>,
    pub series: Vec<CumulativePoint>,
    pub term_series: Vec<TermPoint>,
    pub current_month_key: String,
    pub current_term_label: String,
}

impl AggregateResult {
    /// "3/5 courses scanned" when the number of listed courses is known.
    pub fn coverage(&self, listed: Option<usize>) -> String {
        match listed {
            Some(listed) if listed > 0 => {
                format!("{}/{} courses scanned", self.course_count, listed)
            }
            _ => format!("{} courses scanned", self.course_count),
        }
    }
}

#[derive(Default)]
struct Bucket {
    credits: f64,
    module_count: usize,
}

struct TermBucket {
    range: TermRange,
    bucket: Bucket,
}

#[derive(Default)]
struct Buckets {
    months: BTreeMap<NaiveDate, Bucket>,
    terms: BTreeMap<String, TermBucket>,
}

impl Buckets {
    fn add(&mut self, date: NaiveDate, credits: f64, config: &Config) {
        let month = self.months.entry(month_start(date)).or_default();
        month.credits += credits;
        month.module_count += 1;

        let range = term_range_of(date, config);
        let term = self
            .terms
            .entry(range.label.clone())
            .or_insert_with(|| TermBucket {
                range,
                bucket: Bucket::default(),
            });
        term.bucket.credits += credits;
        term.bucket.module_count += 1;
    }
}

/// Date a passed module counts on: its latest result, else the most recent
/// dated attempt.
pub fn module_date(module: &Module, config: &Config) -> Option<NaiveDate> {
    module
        .latest
        .as_ref()
        .and_then(|r| result_date(r, config.date_basis))
        .or_else(|| {
            module
                .attempts
                .iter()
                .filter_map(|r| result_date(r, config.date_basis))
                .max()
        })
}

fn course_fallback(course: &CourseRecord, config: &Config) -> Option<(NaiveDate, f64)> {
    let result = course.course_result.as_ref().filter(|r| r.is_passed())?;
    let credits = usable_credits(course.course_credits)?;
    let date = result_date(result, config.date_basis)
        .or_else(|| course.term_end.as_deref().and_then(parse_date))
        .or_else(|| course.term_start.as_deref().and_then(parse_date))?;
    Some((date, credits))
}

pub fn aggregate(store: &CourseMap, config: &Config, today: NaiveDate) -> AggregateResult {
    let config = config.clone().sanitized();
    let mut buckets = Buckets::default();
    let mut modules_total = 0;
    let mut modules_passed = 0;

    for course in store.values() {
        modules_total += course.modules.len();
        modules_passed += course.modules_passed();

        let mut course_credits = 0.0;
        for module in course.modules.iter().filter(|m| m.is_passed()) {
            let Some(credits) = usable_credits(module.credits) else {
                continue;
            };
            let Some(date) = module_date(module, &config) else {
                continue;
            };
            buckets.add(date, credits, &config);
            course_credits += credits;
        }

        // Only when no module contributed, so a course is never counted twice.
        if course_credits == 0.0 {
            if let Some((date, credits)) = course_fallback(course, &config) {
                debug!(course_id = %course.course_id, credits, "using course-level result");
                buckets.add(date, credits, &config);
            }
        }
    }

    let month_series: Vec<MonthPoint> = buckets
        .months
        .iter()
        .map(|(date, bucket)| MonthPoint {
            key: month_key(*date),
            date: *date,
            credits: bucket.credits,
        })
        .collect();

    let mut running = 0.0;
    let series: Vec<CumulativePoint> = buckets
        .months
        .iter()
        .map(|(date, bucket)| {
            running += bucket.credits;
            CumulativePoint {
                key: month_key(*date),
                date: *date,
                credits: bucket.credits,
                module_count: bucket.module_count,
                cumulative_credits: running,
            }
        })
        .collect();

    let mut term_series: Vec<TermPoint> = buckets
        .terms
        .into_values()
        .map(|t| TermPoint {
            label: t.range.label,
            date: t.range.start,
            end: t.range.end,
            credits: t.bucket.credits,
            module_count: t.bucket.module_count,
        })
        .collect();
    term_series.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.label.cmp(&b.label)));

    AggregateResult {
        course_count: store.len(),
        modules_total,
        modules_passed,
        has_data: !store.is_empty(),
        total_credits: running,
        month_series,
        series,
        term_series,
        current_month_key: month_key(today),
        current_term_label: term_range_of(today, &config).label,
    }
}

/// Fingerprint of everything an aggregation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snapshot(u64);

impl Snapshot {
    pub fn of(store: &CourseMap, config: &Config, today: NaiveDate) -> Self {
        let mut hasher = DefaultHasher::new();
        serde_json::to_string(store).unwrap_or_default().hash(&mut hasher);
        serde_json::to_string(config).unwrap_or_default().hash(&mut hasher);
        today.hash(&mut hasher);
        Snapshot(hasher.finish())
    }
}

pub struct Refresh {
    pub snapshot: Snapshot,
    /// `None` when nothing changed since `previous`.
    pub result: Option<AggregateResult>,
}

/// Re-aggregates only when the inputs differ from the `previous` snapshot.
pub fn refresh(
    store: &CourseMap,
    config: &Config,
    today: NaiveDate,
    previous: Option<Snapshot>,
) -> Refresh {
    let snapshot = Snapshot::of(store, config, today);
    let result = if previous == Some(snapshot) {
        None
    } else {
        Some(aggregate(store, config, today))
    };
    Refresh { snapshot, result }
}
