//! Sanity checks upstream of scoring.
//!
//! Two flags, both sticky for the rest of the pipeline: a reverse split or a
//! bad reference price masquerades as a huge gainer ("suspected corporate
//! action"), and non-finite or self-contradictory quote data marks the whole
//! row untrustworthy ("suspected bad data"). Flagged rows still appear in
//! the output, flags attached, rather than being silently dropped.

use serde::{Deserialize, Serialize};

/// Thresholds for the sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityLimits {
    /// Previous closes below this are suspicious reference prices.
    pub prevclose_min: f64,
    /// Change% above this on a sub-floor prev close implies a split artifact.
    pub change_pct_max: f64,
    /// Spread% above this is treated as bad data; 0 disables.
    pub spread_pct_max: f64,
    /// A change above `high_change_pct` on volume below this is implausible;
    /// 0 disables.
    pub min_vol_for_high_change: u64,
    pub high_change_pct: f64,
}

impl Default for SanityLimits {
    fn default() -> Self {
        Self {
            prevclose_min: 1.0,
            change_pct_max: 150.0,
            spread_pct_max: 0.05,
            min_vol_for_high_change: 50_000,
            high_change_pct: 80.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SanityFlags {
    pub suspect_corporate_action: bool,
    pub suspect_data: bool,
}

impl SanityFlags {
    pub fn any(&self) -> bool {
        self.suspect_corporate_action || self.suspect_data
    }
}

fn bad_number(value: Option<f64>) -> bool {
    match value {
        Some(v) => v.is_nan() || v.is_infinite(),
        None => true,
    }
}

/// Evaluate the sanity flags for one candidate's quote-derived fields.
pub fn run_sanity_checks(
    last: Option<f64>,
    prev_close: Option<f64>,
    change_pct: Option<f64>,
    spread_pct: Option<f64>,
    volume_today: Option<u64>,
    limits: &SanityLimits,
) -> SanityFlags {
    let mut flags = SanityFlags::default();

    if bad_number(last) || bad_number(prev_close) {
        flags.suspect_data = true;
    }

    if let (Some(pc), Some(chg)) = (prev_close, change_pct) {
        if pc.is_finite() && chg.is_finite() && pc < limits.prevclose_min && chg > limits.change_pct_max
        {
            flags.suspect_corporate_action = true;
        }
    }

    if limits.spread_pct_max > 0.0 {
        if let Some(sp) = spread_pct {
            if sp > limits.spread_pct_max {
                flags.suspect_data = true;
            }
        }
    }

    if limits.min_vol_for_high_change > 0 {
        if let (Some(chg), Some(vol)) = (change_pct, volume_today) {
            if chg.is_finite()
                && chg > limits.high_change_pct
                && vol < limits.min_vol_for_high_change
            {
                flags.suspect_data = true;
            }
        }
    }

    flags
}
