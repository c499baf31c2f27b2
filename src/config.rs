//! Settings consumed by the aggregation and progression engines.
//!
//! Stored under `SETTINGS_KEY` in the same key-value storage as the course
//! map. Loading merges stored values over `Config::default()` one key at a
//! time, so a single bad value only loses that key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::KeyValueStore;

pub const SETTINGS_KEY: &str = "studyquest.settings";

pub const MIN_LEVEL_EXPONENT: f64 = 1.0;
pub const MIN_START_WEEK: u32 = 1;
pub const MAX_START_WEEK: u32 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermBoundaryMode {
    Week,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBasis {
    Exam,
    Decision,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// 1.0 is a linear curve; larger values push XP towards the last levels.
    pub level_exponent: f64,
    pub term_boundary_mode: TermBoundaryMode,
    /// ISO week in which the autumn term starts (week mode only).
    pub academic_year_start_week: u32,
    /// Fold the weeks between spring and autumn into the spring term instead
    /// of reporting a separate summer bucket.
    pub include_summer_weeks: bool,
    pub date_basis: DateBasis,
    /// Credits of the whole programme; the XP needed for level 100.
    pub program_credits: f64,
    pub show_xp_to_next: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level_exponent: 1.2,
            term_boundary_mode: TermBoundaryMode::Week,
            academic_year_start_week: 36,
            include_summer_weeks: true,
            date_basis: DateBasis::Auto,
            program_credits: 180.0,
            show_xp_to_next: true,
        }
    }
}

impl Config {
    /// Clamps out-of-range values to the nearest valid bound.
    pub fn sanitized(mut self) -> Self {
        self.level_exponent = if self.level_exponent.is_finite() {
            self.level_exponent.max(MIN_LEVEL_EXPONENT)
        } else {
            Config::default().level_exponent
        };
        self.academic_year_start_week = self
            .academic_year_start_week
            .clamp(MIN_START_WEEK, MAX_START_WEEK);
        if !self.program_credits.is_finite() || self.program_credits < 0.0 {
            self.program_credits = 0.0;
        }
        self
    }

    /// Merges `stored` over the defaults key by key. Unknown keys and values
    /// of the wrong type are dropped.
    pub fn merged(stored: &Value) -> Self {
        let Value::Object(stored) = stored else {
            return Config::default();
        };

        let mut merged = match serde_json::to_value(Config::default()) {
            Ok(Value::Object(map)) => map,
            _ => return Config::default(),
        };

        for (key, value) in stored {
            if !merged.contains_key(key) {
                debug!(key = %key, "ignoring unknown setting");
                continue;
            }
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value.clone());
            if serde_json::from_value::<Config>(Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            } else {
                warn!(key = %key, value = %value, "ignoring invalid setting");
            }
        }

        serde_json::from_value::<Config>(Value::Object(merged))
            .unwrap_or_default()
            .sanitized()
    }

    pub fn keys() -> Vec<String> {
        match serde_json::to_value(Config::default()) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Reads stored settings merged over the defaults.
pub fn load<S: KeyValueStore + ?Sized>(kv: &S) -> Result<Config> {
    match kv.get(SETTINGS_KEY) {
        Ok(Some(stored)) => Ok(Config::merged(&stored)),
        Ok(None) => Ok(Config::default()),
        Err(Error::Json(e)) => {
            warn!(error = %e, "stored settings are not valid JSON, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e),
    }
}

pub fn save<S: KeyValueStore + ?Sized>(kv: &S, config: &Config) -> Result<()> {
    kv.set(SETTINGS_KEY, &serde_json::to_value(config)?)
}

/// Sets one option from command-line text. The value is read as JSON when
/// possible (`1.5`, `true`) and as a plain string otherwise (`fixed`).
pub fn set_option<S: KeyValueStore + ?Sized>(kv: &S, key: &str, raw: &str) -> Result<Config> {
    if !Config::keys().iter().any(|k| k == key) {
        return Err(Error::InvalidInput(format!(
            "Unknown setting '{}'. Known settings: {}",
            key,
            Config::keys().join(", ")
        )));
    }

    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let mut stored = match kv.get(SETTINGS_KEY)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    stored.insert(key.to_string(), value.clone());

    let mut candidate = match serde_json::to_value(Config::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    candidate.insert(key.to_string(), value);
    if serde_json::from_value::<Config>(Value::Object(candidate)).is_err() {
        return Err(Error::InvalidInput(format!(
            "Invalid value '{}' for setting '{}'",
            raw, key
        )));
    }

    let stored = Value::Object(stored);
    kv.set(SETTINGS_KEY, &stored)?;
    Ok(Config::merged(&stored))
}
