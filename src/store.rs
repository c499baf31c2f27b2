use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::CourseRecord;

/// Fixed key holding the whole course map as one JSON object.
pub const COURSES_KEY: &str = "studyquest.courses";

/// Durable storage of JSON blobs by key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
}

pub type CourseMap = BTreeMap<String, CourseRecord>;

/// Course records keyed by course id, last write wins.
pub struct CourseStore<'a, S: KeyValueStore + ?Sized> {
    kv: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> CourseStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        Self { kv }
    }

    /// Reads the course map for display. An unreadable blob reads as empty.
    fn load_raw(&self) -> Result<Map<String, Value>> {
        match self.kv.get(COURSES_KEY) {
            Ok(Some(Value::Object(map))) => Ok(map),
            Ok(Some(other)) => {
                warn!(kind = %json_kind(&other), "stored course map is not an object, reading it as empty");
                Ok(Map::new())
            }
            Ok(None) => Ok(Map::new()),
            Err(Error::Json(e)) => {
                warn!(error = %e, "stored course map is not valid JSON, reading it as empty");
                Ok(Map::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Reads the course map for a write. Anything but an object or nothing
    /// is an error, so a damaged blob is never overwritten.
    fn load_for_write(&self) -> Result<Map<String, Value>> {
        match self.kv.get(COURSES_KEY)? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(Error::InvalidInput(format!(
                "stored course map is a {}, not an object; refusing to overwrite it",
                json_kind(&other)
            ))),
            None => Ok(Map::new()),
        }
    }

    pub fn get_all(&self) -> Result<CourseMap> {
        let raw = self.load_raw()?;
        let mut courses = CourseMap::new();
        for (id, value) in raw {
            match serde_json::from_value::<CourseRecord>(value) {
                Ok(record) => {
                    courses.insert(id, record);
                }
                Err(e) => warn!(course_id = %id, error = %e, "skipping unreadable course record"),
            }
        }
        Ok(courses)
    }

    pub fn get(&self, course_id: &str) -> Result<Option<CourseRecord>> {
        Ok(self.get_all()?.remove(course_id))
    }

    pub fn find_by_course_code(&self, code: &str) -> Result<Option<CourseRecord>> {
        Ok(self
            .get_all()?
            .into_values()
            .find(|c| c.course_code.as_deref() == Some(code)))
    }

    /// Replaces any record stored under the same course id. Returns `false`
    /// without touching storage when the record has no id.
    pub fn upsert(&self, mut record: CourseRecord) -> Result<bool> {
        let course_id = record.course_id.trim().to_string();
        if course_id.is_empty() {
            warn!("refusing to store a course record without course id");
            return Ok(false);
        }
        record.course_id = course_id.clone();

        let mut raw = self.load_for_write()?;

        let previous_seen = raw
            .get(&course_id)
            .and_then(|prev| prev.get("lastSeenAt"))
            .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok());
        if let Some(prev) = previous_seen {
            if record.last_seen_at <= prev {
                record.last_seen_at = prev + Duration::milliseconds(1);
            }
        }

        raw.insert(course_id.clone(), serde_json::to_value(&record)?);
        self.kv.set(COURSES_KEY, &Value::Object(raw))?;

        debug!(course_id = %course_id, modules = record.modules.len(), "stored course record");
        Ok(true)
    }

    /// Validates untyped input before storing it.
    pub fn upsert_value(&self, value: &Value) -> Result<bool> {
        if !value.is_object() {
            warn!(kind = %json_kind(value), "refusing to store a non-object course record");
            return Ok(false);
        }
        match serde_json::from_value::<CourseRecord>(value.clone()) {
            Ok(record) => self.upsert(record),
            Err(e) => {
                warn!(error = %e, "refusing to store an invalid course record");
                Ok(false)
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
