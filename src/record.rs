//! ### Record
//! Row shapes flowing through the congestion pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::level::CongestionLevel;

/// One observation: the energy drawn by a charge type during one hour of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRecord {
    pub date: NaiveDate,
    pub charge_type: String,
    pub hour: u8,
    pub energy_kwh: f64,
}

/// Mean energy for a (charge_type, hour) pair across every observed day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyMean {
    pub charge_type: String,
    pub hour: u8,
    pub mean_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedHour {
    pub charge_type: String,
    pub hour: u8,
    pub mean_kwh: f64,
    pub level: CongestionLevel,
}

/// Canonical fields a source column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    ChargeType,
    Hour,
    EnergyKwh,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Date, Field::ChargeType, Field::Hour, Field::EnergyKwh];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Date => "date",
            Field::ChargeType => "charge_type",
            Field::Hour => "hour",
            Field::EnergyKwh => "energy_kwh",
        };
        f.write_str(name)
    }
}
