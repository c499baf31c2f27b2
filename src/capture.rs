//! Recognising captured course-information responses.
//!
//! The page hook posts every matching response as a `CaptureEnvelope`; these
//! helpers decide which responses matter and which course they belong to.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::CourseRecord;
use crate::normalize::normalize;
use crate::store::{CourseStore, KeyValueStore};

pub const ENVELOPE_SOURCE: &str = "ladokpp";
pub const ENVELOPE_KIND: &str = "egenkursinformation";

/// The student course-information endpoint; both ids are 36-character uuids.
static COURSE_INFO_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/student/proxy/resultat/internal/studentenskurser/egenkursinformation/student/[0-9a-f-]{36}/kursUID/[0-9a-f-]{36}",
    )
    .unwrap()
});

/// Scheme and host are optional; query and fragment are left out of group 1.
static URL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.-]*://[^/?#]*)?([^?#]*)").unwrap());

static COURSE_ID_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|/)kursUID/([^/]+)").unwrap());

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureEnvelope {
    pub source: String,
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "kursUID", default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl CaptureEnvelope {
    pub fn is_course_info(&self) -> bool {
        self.source == ENVELOPE_SOURCE && self.kind == ENVELOPE_KIND
    }

    /// The explicit course id if present, otherwise the one in the captured url.
    pub fn resolved_course_id(&self) -> Option<String> {
        self.course_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .or_else(|| self.url.as_deref().and_then(course_id_from_path))
    }
}

fn path_of(url: &str) -> &str {
    URL_PATH
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str())
}

/// Whether the url's path contains the student course-information endpoint.
pub fn is_course_info_path(url: &str) -> bool {
    COURSE_INFO_PATH.is_match(path_of(url))
}

/// The path segment following `kursUID`, if any.
pub fn course_id_from_path(url: &str) -> Option<String> {
    COURSE_ID_SEGMENT
        .captures(path_of(url))
        .map(|caps| caps[1].to_string())
}

/// What happened to one captured payload.
#[derive(Debug)]
pub enum Ingested {
    Stored(CourseRecord),
    Rejected(String),
}

/// Normalizes and stores one capture. `input` is either a `CaptureEnvelope`,
/// the bare payload, or an already normalized record (one with `courseId`);
/// `course_id` and `url` override what the envelope says.
pub fn ingest<S: KeyValueStore + ?Sized>(
    kv: &S,
    input: &Value,
    course_id: Option<&str>,
    url: Option<&str>,
) -> Result<Ingested> {
    let store = CourseStore::new(kv);

    if let Some(id) = input.get("courseId").and_then(Value::as_str) {
        if !store.upsert_value(input)? {
            return Ok(reject("not a valid course record".to_string()));
        }
        return Ok(match store.get(id.trim())? {
            Some(record) => Ingested::Stored(record),
            None => reject("stored record could not be read back".to_string()),
        });
    }

    let explicit_id = course_id.map(str::trim).filter(|id| !id.is_empty());

    let (payload, resolved_id) = match serde_json::from_value::<CaptureEnvelope>(input.clone()) {
        Ok(envelope) => {
            if !envelope.is_course_info() {
                return Ok(reject(format!(
                    "capture from '{}' of kind '{}' is not course information",
                    envelope.source, envelope.kind
                )));
            }
            if let Some(url) = envelope.url.as_deref().filter(|u| !is_course_info_path(u)) {
                return Ok(reject(format!("'{}' is not a course information endpoint", url)));
            }
            let id = explicit_id
                .map(String::from)
                .or_else(|| envelope.resolved_course_id());
            (envelope.data, id)
        }
        Err(_) => {
            let id = explicit_id
                .map(String::from)
                .or_else(|| url.and_then(course_id_from_path));
            (input.clone(), id)
        }
    };

    let Some(resolved_id) = resolved_id else {
        return Ok(reject("no course id; pass --course-id or --url".to_string()));
    };

    let Some(record) = normalize(&payload, &resolved_id) else {
        return Ok(reject(format!(
            "payload for course {} has no readable course version",
            resolved_id
        )));
    };

    if !store.upsert(record.clone())? {
        return Ok(reject("course record has no course id".to_string()));
    }
    info!(course_id = %record.course_id, modules = record.modules.len(), "ingested course");

    Ok(Ingested::Stored(store.get(&record.course_id)?.unwrap_or(record)))
}

fn reject(reason: String) -> Ingested {
    warn!(reason = %reason, "capture rejected");
    Ingested::Rejected(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STUDENT: &str = "0f8e6a3c-1b2d-4e5f-8a9b-0c1d2e3f4a5b";
    const COURSE: &str = "a1b2c3d4-e5f6-4789-abcd-ef0123456789";

    fn course_url() -> String {
        format!(
            "https://www.student.ladok.se/student/proxy/resultat/internal/studentenskurser/egenkursinformation/student/{}/kursUID/{}?x=1",
            STUDENT, COURSE
        )
    }

    mod path_tests {
        use super::*;

        #[test]
        fn recognises_course_info_url() {
            assert!(is_course_info_path(&course_url()));
        }

        #[test]
        fn recognises_relative_path_case_insensitively() {
            let path = format!(
                "/Student/Proxy/Resultat/Internal/StudentensKurser/EgenKursInformation/student/{}/KURSUID/{}",
                STUDENT.to_uppercase(),
                COURSE
            );
            assert!(is_course_info_path(&path));
        }

        #[test]
        fn rejects_other_endpoints() {
            assert!(!is_course_info_path("/student/proxy/resultat/internal/other"));
            assert!(!is_course_info_path(&format!(
                "/student/proxy/resultat/internal/studentenskurser/egenkursinformation/student/short/kursUID/{}",
                COURSE
            )));
            assert!(!is_course_info_path(""));
        }

        #[test]
        fn extracts_course_id() {
            assert_eq!(course_id_from_path(&course_url()), Some(COURSE.to_string()));
        }

        #[test]
        fn missing_course_segment_yields_none() {
            assert_eq!(course_id_from_path("/student/kursUID"), None);
            assert_eq!(course_id_from_path("/student/kursUID/"), None);
            assert_eq!(course_id_from_path("/student/app"), None);
        }

        #[test]
        fn query_and_fragment_are_ignored() {
            let url = format!(
                "https://example.org/app?next=/student/proxy/resultat/internal/studentenskurser/egenkursinformation/student/{}/kursUID/{}",
                STUDENT, COURSE
            );
            assert!(!is_course_info_path(&url));
            assert_eq!(course_id_from_path("/a/kursUID/abc#frag"), Some("abc".to_string()));
        }
    }

    mod envelope_tests {
        use super::*;

        #[test]
        fn accepts_course_info_envelope() {
            let envelope: CaptureEnvelope = serde_json::from_value(json!({
                "source": "ladokpp",
                "kind": "egenkursinformation",
                "url": course_url(),
                "kursUID": COURSE,
                "data": { "Kursversioner": [] }
            }))
            .unwrap();
            assert!(envelope.is_course_info());
            assert_eq!(envelope.resolved_course_id(), Some(COURSE.to_string()));
        }

        #[test]
        fn falls_back_to_url_course_id() {
            let envelope: CaptureEnvelope = serde_json::from_value(json!({
                "source": "ladokpp",
                "kind": "egenkursinformation",
                "url": course_url(),
                "kursUID": "  ",
                "data": {}
            }))
            .unwrap();
            assert_eq!(envelope.resolved_course_id(), Some(COURSE.to_string()));
        }

        #[test]
        fn rejects_foreign_envelope() {
            let envelope: CaptureEnvelope = serde_json::from_value(json!({
                "source": "someone-else",
                "kind": "egenkursinformation",
                "data": {}
            }))
            .unwrap();
            assert!(!envelope.is_course_info());
            assert_eq!(envelope.resolved_course_id(), None);
        }
    }

    mod ingest_tests {
        use super::*;
        use crate::db::Database;

        fn setup_db() -> Database {
            let db = Database::open(":memory:").expect("Failed to create in-memory database");
            db.init().expect("Failed to initialize database");
            db
        }

        fn payload() -> Value {
            json!({
                "Kursversioner": [{
                    "ArAktuellVersion": true,
                    "VersionensKurs": {
                        "Kod": "TDA555",
                        "Utbildningsinstansbenamningar": { "sv": "Programmering" }
                    },
                    "VersionensModuler": [{
                        "Kod": "0101",
                        "Omfattning": { "parsedValue": 7.5 },
                        "ResultatPaUtbildning": {
                            "SenastAttesteradeResultat": {
                                "Betygsgradsobjekt": { "Kod": "G" },
                                "Examinationsdatum": "2024-10-15"
                            }
                        }
                    }]
                }]
            })
        }

        fn stored(outcome: Ingested) -> CourseRecord {
            match outcome {
                Ingested::Stored(record) => record,
                Ingested::Rejected(reason) => panic!("Expected stored, got rejection: {}", reason),
            }
        }

        #[test]
        fn stores_envelope() {
            let db = setup_db();
            let envelope = json!({
                "source": ENVELOPE_SOURCE,
                "kind": ENVELOPE_KIND,
                "url": course_url(),
                "data": payload()
            });
            let record = stored(ingest(&db, &envelope, None, None).unwrap());
            assert_eq!(record.course_id, COURSE);
            assert_eq!(record.course_code.as_deref(), Some("TDA555"));
            assert!(CourseStore::new(&db).get(COURSE).unwrap().is_some());
        }

        #[test]
        fn stores_bare_payload_with_explicit_id() {
            let db = setup_db();
            let record = stored(ingest(&db, &payload(), Some("kurs-1"), None).unwrap());
            assert_eq!(record.course_id, "kurs-1");
            assert_eq!(record.modules.len(), 1);
        }

        #[test]
        fn bare_payload_takes_id_from_url() {
            let db = setup_db();
            let record = stored(ingest(&db, &payload(), None, Some(&course_url())).unwrap());
            assert_eq!(record.course_id, COURSE);
        }

        #[test]
        fn rejects_payload_without_id() {
            let db = setup_db();
            let outcome = ingest(&db, &payload(), Some("  "), None).unwrap();
            assert!(matches!(outcome, Ingested::Rejected(_)));
            assert!(CourseStore::new(&db).get_all().unwrap().is_empty());
        }

        #[test]
        fn rejects_foreign_envelope() {
            let db = setup_db();
            let envelope = json!({ "source": "other", "kind": "thing", "data": payload() });
            let outcome = ingest(&db, &envelope, Some("kurs-1"), None).unwrap();
            assert!(matches!(outcome, Ingested::Rejected(_)));
        }

        #[test]
        fn rejects_envelope_from_other_endpoint() {
            let db = setup_db();
            let envelope = json!({
                "source": ENVELOPE_SOURCE,
                "kind": ENVELOPE_KIND,
                "url": "/student/proxy/resultat/internal/other",
                "kursUID": COURSE,
                "data": payload()
            });
            let outcome = ingest(&db, &envelope, None, None).unwrap();
            assert!(matches!(outcome, Ingested::Rejected(_)));
        }

        #[test]
        fn stores_normalized_record() {
            let db = setup_db();
            let record = json!({
                "courseId": "kurs-9",
                "courseName": "Kemi",
                "modules": [{ "name": "Lab", "credits": 1.5, "latest": { "grade": "G" } }]
            });
            let stored = stored(ingest(&db, &record, None, None).unwrap());
            assert_eq!(stored.course_id, "kurs-9");
            assert_eq!(stored.modules.len(), 1);
        }

        #[test]
        fn rejects_malformed_normalized_record() {
            let db = setup_db();
            let outcome = ingest(&db, &json!({ "courseId": "x", "modules": 7 }), None, None).unwrap();
            assert!(matches!(outcome, Ingested::Rejected(_)));
        }

        #[test]
        fn rejects_payload_without_versions() {
            let db = setup_db();
            let outcome = ingest(&db, &json!({ "Kursversioner": [] }), Some("kurs-1"), None).unwrap();
            assert!(matches!(outcome, Ingested::Rejected(_)));
            assert!(CourseStore::new(&db).get_all().unwrap().is_empty());
        }
    }
}
