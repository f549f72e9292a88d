//! ### Convert
//! Tools for turning the wide daily charging extract into a long-form csv
//! and for exporting classified results as csv.

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::load::{read_wide_csv, SchemaMapping};
use crate::record::ClassifiedHour;

#[derive(Serialize)]
struct SeriesCsvRow {
    hour: u8,
    mean_kwh: f64,
}

#[derive(Serialize)]
struct ClassifiedCsvRow<'a> {
    charge_type: &'a str,
    hour: u8,
    mean_kwh: f64,
    level: &'static str,
}

/// Melts a wide extract (`<date>,<charge type>,0시,..,23시`) into long-form
/// rows of `date,charge_type,hour,energy_kwh`. Returns the number of rows written.
pub fn melt_wide_csv<W: Write>(
    input: &Path,
    output: W,
    mapping: &SchemaMapping,
    hour_suffix: &str,
) -> anyhow::Result<usize> {
    let records = read_wide_csv(File::open(input)?, mapping, hour_suffix)?;
    let mut out_csv = csv::Writer::from_writer(output);
    for record in &records {
        out_csv.serialize(record)?;
    }
    out_csv.flush()?;
    Ok(records.len())
}

pub fn convert_wide_load_csv(
    input: &Path,
    output: &Path,
    mapping: &SchemaMapping,
    hour_suffix: &str,
) -> anyhow::Result<usize> {
    melt_wide_csv(input, File::create(output)?, mapping, hour_suffix)
}

pub fn write_classified<W: Write>(output: W, rows: &[ClassifiedHour]) -> anyhow::Result<()> {
    let mut out_csv = csv::Writer::from_writer(output);
    for row in rows {
        out_csv.serialize(ClassifiedCsvRow {
            charge_type: &row.charge_type,
            hour: row.hour,
            mean_kwh: row.mean_kwh,
            level: row.level.meta().label,
        })?;
    }
    out_csv.flush()?;
    Ok(())
}

pub fn write_classified_csv(output: &Path, rows: &[ClassifiedHour]) -> anyhow::Result<()> {
    write_classified(File::create(output)?, rows)
}

/// Always writes the `hour,mean_kwh` header, so an unknown charge type
/// still yields an explicit empty series.
pub fn write_series<W: Write>(output: W, series: &[(u8, f64)]) -> anyhow::Result<()> {
    let mut out_csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    out_csv.write_record(["hour", "mean_kwh"])?;
    for &(hour, mean_kwh) in series {
        out_csv.serialize(SeriesCsvRow { hour, mean_kwh })?;
    }
    out_csv.flush()?;
    Ok(())
}

pub fn write_series_csv(output: &Path, series: &[(u8, f64)]) -> anyhow::Result<()> {
    write_series(File::create(output)?, series)
}
