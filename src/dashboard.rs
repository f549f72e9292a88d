//! ### Dashboard
//! One render pass of the congestion page: load, average, classify, and
//! hand the caller a state it can show directly.

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::compute::{aggregate, classify};
use crate::level::LevelInfo;
use crate::load::{LoadError, LoadSource};
use crate::query;
use crate::record::{ClassifiedHour, LoadRecord};

/// Classified table for one pass plus the read operations the page needs.
#[derive(Debug, Clone, Default)]
pub struct CongestionBoard {
    charge_types: Vec<String>,
    classified: Vec<ClassifiedHour>,
}

impl CongestionBoard {
    pub fn build(records: &[LoadRecord]) -> Self {
        let means = aggregate(records);
        let classified = classify(&means);
        tracing::debug!(
            records = records.len(),
            hourly_means = means.len(),
            "built congestion table"
        );
        Self {
            charge_types: query::charge_types(records),
            classified,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classified.is_empty()
    }

    pub fn classified(&self) -> &[ClassifiedHour] {
        &self.classified
    }

    /// Selector values, sorted.
    pub fn charge_types(&self) -> &[String] {
        &self.charge_types
    }

    pub fn current_level(&self, charge_type: &str, hour: u8) -> Option<LevelInfo> {
        query::current_level(&self.classified, charge_type, hour)
    }

    pub fn hourly_series(&self, charge_type: &str) -> Vec<(u8, f64)> {
        query::hourly_series(&self.classified, charge_type)
    }

    pub fn hours(&self, charge_type: &str) -> Vec<&ClassifiedHour> {
        query::hours_of(&self.classified, charge_type)
    }
}

/// What the page should show after a pass.
#[derive(Debug)]
pub enum PageState {
    Ready(CongestionBoard),
    /// The source answered with zero rows.
    NoData,
    /// The source could not be read; carries a user-facing reason.
    Unavailable(String),
}

impl From<LoadError> for PageState {
    fn from(err: LoadError) -> Self {
        PageState::Unavailable(err.to_string())
    }
}

impl PageState {
    pub fn from_records(records: &[LoadRecord]) -> Self {
        if records.is_empty() {
            PageState::NoData
        } else {
            PageState::Ready(CongestionBoard::build(records))
        }
    }

    pub fn board(&self) -> Option<&CongestionBoard> {
        match self {
            PageState::Ready(board) => Some(board),
            PageState::NoData | PageState::Unavailable(_) => None,
        }
    }
}

/// Runs one full pass against `source`, reading through `cache`.
pub fn render_pass(source: &dyn LoadSource, cache: &TtlCache<Vec<LoadRecord>>) -> PageState {
    let records: Result<Arc<Vec<LoadRecord>>, LoadError> =
        cache.get_or_load(&source.cache_key(), || source.load());
    match records {
        Ok(records) => PageState::from_records(&records),
        Err(err) => {
            tracing::warn!(
                error = %err,
                source = %source.cache_key(),
                "congestion data unavailable"
            );
            err.into()
        }
    }
}
