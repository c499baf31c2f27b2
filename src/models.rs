use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grade codes that count as a pass. Matching is exact and case-sensitive.
pub const PASSING_GRADES: [&str; 6] = ["G", "A", "B", "C", "D", "E"];

pub fn is_passed(grade: Option<&str>) -> bool {
    grade.is_some_and(|g| PASSING_GRADES.contains(&g))
}

/// A credit value only counts when it is finite and strictly positive.
pub fn usable_credits(credits: Option<f64>) -> Option<f64> {
    credits.filter(|c| c.is_finite() && *c > 0.0)
}

/// One assessment outcome. Dates are kept as the ISO strings they arrived as.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub exam_date: Option<String>,
    #[serde(default)]
    pub decision_date: Option<String>,
}

impl GradeResult {
    pub fn is_passed(&self) -> bool {
        is_passed(self.grade.as_deref())
    }

    pub fn grade_label(&self) -> &str {
        self.grade.as_deref().unwrap_or("-")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(default)]
    pub module_code: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub credits: Option<f64>,
    #[serde(default)]
    pub latest: Option<GradeResult>,
    /// Every known attempt, `latest` included, sorted by exam date with undated first.
    #[serde(default)]
    pub attempts: Vec<GradeResult>,
}

impl Module {
    pub fn is_passed(&self) -> bool {
        self.latest.as_ref().is_some_and(GradeResult::is_passed)
    }
}

/// The normalized per-course record; the unit of persistence and upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub course_id: String,
    #[serde(default)]
    pub course_term_id: Option<String>,
    #[serde(default)]
    pub term_start: Option<String>,
    #[serde(default)]
    pub term_end: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub course_name: String,
    #[serde(default)]
    pub course_credits: Option<f64>,
    #[serde(default)]
    pub course_result: Option<GradeResult>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub last_seen_at: DateTime<Utc>,
}

impl CourseRecord {
    pub fn modules_passed(&self) -> usize {
        self.modules.iter().filter(|m| m.is_passed()).count()
    }

    pub fn display_name(&self) -> &str {
        if self.course_name.is_empty() {
            self.course_code.as_deref().unwrap_or(&self.course_id)
        } else {
            &self.course_name
        }
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
