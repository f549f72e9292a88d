//! ### Compute
//! Hourly averaging and quantile-based congestion classification over
//! records produced by the `load` module.

use itertools::Itertools;
use std::collections::BTreeMap;

use crate::level::CongestionLevel;
use crate::record::{ClassifiedHour, HourlyMean, LoadRecord};

const LOWER_QUANTILE: f64 = 0.25;
const UPPER_QUANTILE: f64 = 0.75;

/// Mean energy per (charge_type, hour). Output is ordered by charge type,
/// then hour, with exactly one entry per key present in `records`.
pub fn aggregate(records: &[LoadRecord]) -> Vec<HourlyMean> {
    let mut sums: BTreeMap<(&str, u8), (f64, u32)> = BTreeMap::new();
    for record in records {
        let (total, count) = sums
            .entry((record.charge_type.as_str(), record.hour))
            .or_insert((0., 0));
        *total += record.energy_kwh;
        *count += 1;
    }

    sums.into_iter()
        .map(|((charge_type, hour), (total, count))| HourlyMean {
            charge_type: charge_type.to_string(),
            hour,
            mean_kwh: total / f64::from(count),
        })
        .collect()
}

/// Quantile `q` of `values` by linear interpolation between order statistics:
/// with `n` sorted values the position is `(n - 1) * q` and the result blends
/// the two neighbouring values by its fractional part.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let pos = (sorted.len() - 1) as f64 * q.clamp(0., 1.);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Lower and upper cut points of one charge type's hourly means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub q25: f64,
    pub q75: f64,
}

impl Thresholds {
    pub fn from_means(means: &[f64]) -> Option<Self> {
        Some(Self {
            q25: quantile(means, LOWER_QUANTILE)?,
            q75: quantile(means, UPPER_QUANTILE)?,
        })
    }

    // The upper check runs first: when q25 == q75 a value sitting on both
    // cut points is Congested, so a lone hour always reads as Congested.
    pub fn level_of(&self, mean_kwh: f64) -> CongestionLevel {
        if mean_kwh >= self.q75 {
            CongestionLevel::Congested
        } else if mean_kwh <= self.q25 {
            CongestionLevel::Light
        } else {
            CongestionLevel::Moderate
        }
    }
}

/// Classifies the hours of a single charge type against that charge type's
/// own thresholds.
pub fn classify_group(charge_type: &str, hours: &[&HourlyMean]) -> Vec<ClassifiedHour> {
    let values = hours.iter().map(|row| row.mean_kwh).collect_vec();
    let Some(thresholds) = Thresholds::from_means(&values) else {
        return Vec::new();
    };
    tracing::debug!(
        charge_type,
        hours = hours.len(),
        q25 = thresholds.q25,
        q75 = thresholds.q75,
        "classified charge type"
    );

    hours
        .iter()
        .map(|row| ClassifiedHour {
            charge_type: charge_type.to_string(),
            hour: row.hour,
            mean_kwh: row.mean_kwh,
            level: thresholds.level_of(row.mean_kwh),
        })
        .collect()
}

/// Assigns a congestion level to every hourly mean. Thresholds are computed
/// per charge type, never across the whole set.
pub fn classify(means: &[HourlyMean]) -> Vec<ClassifiedHour> {
    let mut groups: BTreeMap<&str, Vec<&HourlyMean>> = BTreeMap::new();
    for row in means {
        groups.entry(row.charge_type.as_str()).or_default().push(row);
    }

    groups
        .into_iter()
        .flat_map(|(charge_type, hours)| classify_group(charge_type, &hours))
        .collect()
}
