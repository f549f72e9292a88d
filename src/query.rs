//! ### Query
//! Read operations over a classified table: the charge type selector,
//! point lookups and chartable hour series. Unknown charge types yield
//! empty results rather than errors.

use itertools::Itertools;

use crate::level::LevelInfo;
use crate::record::{ClassifiedHour, LoadRecord};

/// Distinct charge types present in the raw records, sorted.
pub fn charge_types(records: &[LoadRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.charge_type.as_str())
        .unique()
        .sorted()
        .map(str::to_string)
        .collect()
}

/// Level of one (charge_type, hour) pair. `hour` is supplied by the caller,
/// usually the local wall-clock hour.
pub fn current_level(
    classified: &[ClassifiedHour],
    charge_type: &str,
    hour: u8,
) -> Option<LevelInfo> {
    classified
        .iter()
        .find(|row| row.charge_type == charge_type && row.hour == hour)
        .map(|row| LevelInfo::new(charge_type, hour, row.level))
}

/// Rows of one charge type ordered by hour.
pub fn hours_of<'a>(
    classified: &'a [ClassifiedHour],
    charge_type: &str,
) -> Vec<&'a ClassifiedHour> {
    classified
        .iter()
        .filter(|row| row.charge_type == charge_type)
        .sorted_by_key(|row| row.hour)
        .collect()
}

/// `(hour, mean_kwh)` pairs for one charge type, ascending by hour.
/// Hours that were never observed are left out, not zero-filled.
pub fn hourly_series(classified: &[ClassifiedHour], charge_type: &str) -> Vec<(u8, f64)> {
    hours_of(classified, charge_type)
        .into_iter()
        .map(|row| (row.hour, row.mean_kwh))
        .collect()
}
