use serde::Serialize;

pub const LEVEL_CAP: u32 = 100;
pub const XP_PER_CREDIT: f64 = 100.0;

/// XP curve over levels 1..=100 for a given credit total.
///
/// `required_xp(level) = xp_total * ((level - 1) / 99) ^ exponent`, so level 1
/// needs nothing and level 100 needs all of `xp_total`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub xp_total: u64,
    pub exponent: f64,
}

/// Where a student stands on the curve, as shown next to the level badge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStatus {
    pub level: u32,
    pub next_level: u32,
    pub xp: f64,
    pub xp_this_level: f64,
    pub xp_next_level: f64,
    pub into_level: f64,
    pub span: f64,
    pub percent: f64,
}

impl Progression {
    pub fn new(total_credits: f64, exponent: f64) -> Self {
        let credits = if total_credits.is_finite() && total_credits > 0.0 {
            total_credits
        } else {
            0.0
        };
        let exponent = if exponent.is_finite() {
            exponent.max(1.0)
        } else {
            1.0
        };
        Self {
            xp_total: (credits * XP_PER_CREDIT).round() as u64,
            exponent,
        }
    }

    pub fn required_xp(&self, level: u32) -> f64 {
        let level = level.clamp(1, LEVEL_CAP);
        let t = (level - 1) as f64 / (LEVEL_CAP - 1) as f64;
        self.xp_total as f64 * t.powf(self.exponent)
    }

    /// Highest level whose requirement is met, by binary search over the
    /// monotone curve. Ties resolve to the highest level.
    pub fn level_from_xp(&self, xp: f64) -> u32 {
        let xp = if xp.is_nan() {
            0.0
        } else {
            xp.clamp(0.0, self.xp_total as f64)
        };

        let (mut lo, mut hi) = (1, LEVEL_CAP);
        while lo < hi {
            let mid = (lo + hi).div_ceil(2);
            if self.required_xp(mid) <= xp {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    pub fn status(&self, completed_credits: f64) -> LevelStatus {
        let xp = if completed_credits.is_finite() {
            completed_credits.max(0.0) * XP_PER_CREDIT
        } else {
            0.0
        };
        let level = self.level_from_xp(xp);
        let next_level = (level + 1).min(LEVEL_CAP);

        let xp_this_level = self.required_xp(level);
        let xp_next_level = self.required_xp(next_level);
        let into_level = xp - xp_this_level;
        let span = (xp_next_level - xp_this_level).max(1.0);
        let percent = (into_level / span * 100.0).clamp(0.0, 100.0);

        LevelStatus {
            level,
            next_level,
            xp,
            xp_this_level,
            xp_next_level,
            into_level,
            span,
            percent,
        }
    }
}
