//! Turns the verbose course-information payload into a compact `CourseRecord`.
//!
//! The raw types below name only the fields we keep. serde drops every other
//! field (student identifiers included) at the boundary, and each field is
//! parsed leniently: a value of the wrong shape becomes absent instead of
//! failing the whole payload.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::{CourseRecord, GradeResult, Module};

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawCourseInfo {
    #[serde(rename = "Kursversioner", default, deserialize_with = "lenient_vec")]
    versions: Vec<RawVersion>,
    #[serde(rename = "GallandeKurstillfalle", default, deserialize_with = "lenient")]
    current_instance: Option<RawInstance>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVersion {
    #[serde(rename = "ArAktuellVersion", default, deserialize_with = "lenient")]
    is_current: Option<bool>,
    #[serde(rename = "VersionensKurs", default, deserialize_with = "lenient")]
    course: Option<RawUnit>,
    #[serde(rename = "VersionensModuler", default, deserialize_with = "lenient_vec")]
    modules: Vec<RawUnit>,
    #[serde(rename = "GallandeKurstillfalleUID", default, deserialize_with = "lenient")]
    instance_uid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInstance {
    #[serde(rename = "Uid", default, deserialize_with = "lenient")]
    uid: Option<String>,
    #[serde(rename = "Startdatum", default, deserialize_with = "lenient")]
    start: Option<String>,
    #[serde(rename = "Slutdatum", default, deserialize_with = "lenient")]
    end: Option<String>,
}

/// Shared shape of the course descriptor and its modules.
#[derive(Debug, Default, Deserialize)]
struct RawUnit {
    #[serde(rename = "Kod", default, deserialize_with = "lenient")]
    code: Option<String>,
    #[serde(rename = "Utbildningsinstansbenamningar", default, deserialize_with = "lenient")]
    names: Option<RawNames>,
    #[serde(rename = "Omfattning", default, deserialize_with = "lenient")]
    scope: Option<RawScope>,
    #[serde(rename = "ResultatPaUtbildning", default, deserialize_with = "lenient")]
    results: Option<RawResults>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNames {
    #[serde(default, deserialize_with = "lenient")]
    sv: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    en: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScope {
    #[serde(rename = "parsedValue", default)]
    parsed_value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResults {
    #[serde(rename = "SenastAttesteradeResultat", default, deserialize_with = "lenient")]
    latest: Option<RawResult>,
    #[serde(rename = "OvrigaResultat", default, deserialize_with = "lenient_vec")]
    others: Vec<RawResult>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResult {
    #[serde(rename = "Betygsgradsobjekt", default, deserialize_with = "lenient")]
    grade: Option<RawGrade>,
    #[serde(rename = "Examinationsdatum", default, deserialize_with = "lenient")]
    exam_date: Option<String>,
    #[serde(rename = "Beslutsdatum", default, deserialize_with = "lenient")]
    decision_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGrade {
    #[serde(rename = "Kod", default, deserialize_with = "lenient")]
    code: Option<String>,
}

impl RawNames {
    fn preferred(&self) -> String {
        self.sv.clone().or_else(|| self.en.clone()).unwrap_or_default()
    }
}

impl RawUnit {
    fn name(&self) -> String {
        self.names.as_ref().map(RawNames::preferred).unwrap_or_default()
    }

    fn credits(&self) -> Option<f64> {
        self.scope
            .as_ref()
            .and_then(|s| s.parsed_value.as_ref())
            .and_then(parse_credits)
    }

    fn latest_result(&self) -> Option<GradeResult> {
        self.results
            .as_ref()
            .and_then(|r| r.latest.as_ref())
            .map(RawResult::to_result)
    }
}

impl RawResult {
    fn to_result(&self) -> GradeResult {
        GradeResult {
            grade: self.grade.as_ref().and_then(|g| g.code.clone()),
            exam_date: self.exam_date.clone(),
            decision_date: self.decision_date.clone(),
        }
    }
}

/// Reads a nominal credit value that may arrive as a number or as text like "7,5 hp".
pub fn parse_credits(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_credit_text(s),
        _ => None,
    };
    parsed.filter(|n| n.is_finite() && *n >= 0.0)
}

/// A number followed by the credit unit, as in "Period 2: 7,5 hp".
static CREDITS_WITH_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([-−]?)([0-9]+(?:[.,][0-9]+)?)\s*hp").unwrap());

/// A bare number at the start of the text, as in "7,5".
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-−]?)([0-9]+(?:[.,][0-9]+)?)").unwrap());

fn parse_credit_text(text: &str) -> Option<f64> {
    let caps = CREDITS_WITH_UNIT
        .captures(text)
        .or_else(|| LEADING_NUMBER.captures(text))?;
    let magnitude: f64 = caps[2].replace(',', ".").parse().ok()?;
    // Keep the sign so negative values are rejected rather than counted.
    Some(if caps[1].is_empty() { magnitude } else { -magnitude })
}

fn pick_version(versions: &[RawVersion]) -> Option<&RawVersion> {
    versions
        .iter()
        .find(|v| v.is_current == Some(true))
        .or_else(|| versions.first())
}

fn normalize_module(raw: &RawUnit) -> Module {
    let latest = raw.latest_result();

    let mut attempts: Vec<GradeResult> = raw
        .results
        .as_ref()
        .map(|r| r.others.iter().map(RawResult::to_result).collect())
        .unwrap_or_default();
    attempts.extend(latest.clone());
    attempts.sort_by(|a, b| {
        let a = a.exam_date.as_deref().unwrap_or("");
        let b = b.exam_date.as_deref().unwrap_or("");
        a.cmp(b)
    });

    Module {
        module_code: raw.code.clone(),
        name: raw.name(),
        credits: raw.credits(),
        latest,
        attempts,
    }
}

/// Normalizes one payload fetched under `course_id`, stamping it with the current time.
pub fn normalize(payload: &Value, course_id: &str) -> Option<CourseRecord> {
    normalize_at(payload, course_id, Utc::now())
}

pub fn normalize_at(payload: &Value, course_id: &str, now: DateTime<Utc>) -> Option<CourseRecord> {
    let course_id = course_id.trim();
    if course_id.is_empty() {
        debug!("payload has no usable course id");
        return None;
    }

    if !payload.is_object() {
        debug!(course_id, "payload is not an object");
        return None;
    }
    let info: RawCourseInfo = match serde_json::from_value(payload.clone()) {
        Ok(info) => info,
        Err(e) => {
            debug!(course_id, error = %e, "payload could not be read");
            return None;
        }
    };

    let Some(version) = pick_version(&info.versions) else {
        debug!(course_id, "payload has no course version");
        return None;
    };

    let course = version.course.as_ref();
    let instance = info.current_instance.as_ref();

    Some(CourseRecord {
        course_id: course_id.to_string(),
        course_term_id: instance
            .and_then(|i| i.uid.clone())
            .or_else(|| version.instance_uid.clone()),
        term_start: instance.and_then(|i| i.start.clone()),
        term_end: instance.and_then(|i| i.end.clone()),
        course_code: course.and_then(|c| c.code.clone()),
        course_name: course.map(RawUnit::name).unwrap_or_default(),
        course_credits: course.and_then(RawUnit::credits),
        course_result: course.and_then(RawUnit::latest_result),
        modules: version.modules.iter().map(normalize_module).collect(),
        last_seen_at: now,
    })
}
