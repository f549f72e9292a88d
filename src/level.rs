//! ### Level
//! Congestion levels and the fixed display table shown next to them.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionLevel {
    Congested,
    Moderate,
    Light,
}

/// Static presentation data for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelMeta {
    pub label: &'static str,
    pub symbol: &'static str,
    pub color: &'static str,
    pub rgb: (u8, u8, u8),
    pub message: &'static str,
}

const CONGESTED: LevelMeta = LevelMeta {
    label: "Congested",
    symbol: "🔴",
    color: "#d62728",
    rgb: (0xd6, 0x27, 0x28),
    message: "Charging demand at this hour is relatively high.",
};

const MODERATE: LevelMeta = LevelMeta {
    label: "Moderate",
    symbol: "🟠",
    color: "#ff7f0e",
    rgb: (0xff, 0x7f, 0x0e),
    message: "Charging demand at this hour is about average.",
};

const LIGHT: LevelMeta = LevelMeta {
    label: "Light",
    symbol: "🟢",
    color: "#2ca02c",
    rgb: (0x2c, 0xa0, 0x2c),
    message: "Chargers are relatively free at this hour.",
};

impl CongestionLevel {
    pub const fn meta(self) -> &'static LevelMeta {
        match self {
            CongestionLevel::Congested => &CONGESTED,
            CongestionLevel::Moderate => &MODERATE,
            CongestionLevel::Light => &LIGHT,
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.meta().label)
    }
}

/// Result of a point lookup: the level of one (charge_type, hour) pair
/// joined with its display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelInfo {
    pub hour: u8,
    pub charge_type: String,
    pub level: CongestionLevel,
    pub label: &'static str,
    pub symbol: &'static str,
    pub color: &'static str,
    pub message: &'static str,
}

impl LevelInfo {
    pub fn new(charge_type: &str, hour: u8, level: CongestionLevel) -> Self {
        let meta = level.meta();
        Self {
            hour,
            charge_type: charge_type.to_string(),
            level,
            label: meta.label,
            symbol: meta.symbol,
            color: meta.color,
            message: meta.message,
        }
    }
}
