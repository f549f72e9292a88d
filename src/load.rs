//! ### Load
//! Reads raw charging-load observations from CSV extracts or a SQLite
//! table and normalizes them into `LoadRecord`s.
//!
//! Source column names differ between extracts, so every source is built
//! with a `SchemaMapping` that is checked before anything is read.

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::record::{Field, LoadRecord};

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The source could not be reached or does not look the way the
    /// mapping says it should.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
}

fn unavailable(msg: impl Into<String>) -> LoadError {
    LoadError::DataUnavailable(msg.into())
}

/// Anything that can produce the full set of raw records for one render pass.
pub trait LoadSource {
    /// Identifies the underlying data, used as the cache key.
    fn cache_key(&self) -> String;

    /// Reads every record. Zero rows is `Ok(vec![])`, not an error.
    fn load(&self) -> Result<Vec<LoadRecord>, LoadError>;
}

/// `{source column -> canonical field}` configuration for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMapping {
    columns: BTreeMap<Field, String>,
}

impl SchemaMapping {
    pub fn from_source_columns<I, S>(pairs: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (S, Field)>,
        S: Into<String>,
    {
        let mut columns = BTreeMap::new();
        for (source, field) in pairs {
            let source = source.into();
            if let Some(previous) = columns.insert(field, source.clone()) {
                return Err(unavailable(format!(
                    "canonical field '{field}' mapped from both '{previous}' and '{source}'"
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn column(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    /// Fails fast when a field the caller needs has no source column.
    pub fn require(&self, fields: &[Field]) -> Result<(), LoadError> {
        match fields.iter().find(|field| !self.columns.contains_key(*field)) {
            Some(field) => Err(unavailable(format!("no source column mapped to '{field}'"))),
            None => Ok(()),
        }
    }

    fn required_column(&self, field: Field) -> Result<&str, LoadError> {
        self.column(field)
            .ok_or_else(|| unavailable(format!("no source column mapped to '{field}'")))
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|dt| dt.date())
    })
}

/// Validates one row's values and builds the canonical record.
fn build_record(
    row: u64,
    date: &str,
    charge_type: &str,
    hour: i64,
    energy_kwh: f64,
) -> Result<LoadRecord, LoadError> {
    let date =
        parse_date(date).ok_or_else(|| unavailable(format!("row {row}: invalid date '{date}'")))?;
    let charge_type = charge_type.trim();
    if charge_type.is_empty() {
        return Err(unavailable(format!("row {row}: empty charge type")));
    }
    let hour = u8::try_from(hour)
        .ok()
        .filter(|hour| *hour < 24)
        .ok_or_else(|| unavailable(format!("row {row}: hour {hour} outside 0..=23")))?;
    if !energy_kwh.is_finite() || energy_kwh < 0. {
        return Err(unavailable(format!(
            "row {row}: energy {energy_kwh} must be a non-negative number"
        )));
    }

    Ok(LoadRecord {
        date,
        charge_type: charge_type.to_string(),
        hour,
        energy_kwh,
    })
}

fn header_index(headers: &StringRecord, name: &str) -> Result<usize, LoadError> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        .ok_or_else(|| unavailable(format!("missing column '{name}'")))
}

fn row_number(record: &StringRecord, fallback: usize) -> u64 {
    record
        .position()
        .map_or(fallback as u64 + 2, |pos| pos.line())
}

/// Reads a long-form CSV: one observation per row, all four fields mapped.
pub fn read_long_csv<R: Read>(
    reader: R,
    mapping: &SchemaMapping,
) -> Result<Vec<LoadRecord>, LoadError> {
    mapping.require(&Field::ALL)?;
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| unavailable(format!("failed to read CSV headers: {e}")))?
        .clone();

    let mut idx = [0usize; 4];
    for (slot, field) in idx.iter_mut().zip(Field::ALL) {
        *slot = header_index(&headers, mapping.required_column(field)?)?;
    }
    let [date_idx, charge_type_idx, hour_idx, energy_idx] = idx;

    let mut records = Vec::new();
    for (n, line) in reader.records().enumerate() {
        let line = line.map_err(|e| unavailable(format!("failed to read CSV record: {e}")))?;
        let row = row_number(&line, n);
        let cell = |i: usize| line.get(i).unwrap_or("").trim();

        let hour: i64 = cell(hour_idx)
            .parse()
            .map_err(|e| unavailable(format!("row {row}: invalid hour '{}': {e}", cell(hour_idx))))?;
        let energy: f64 = cell(energy_idx).parse().map_err(|e| {
            unavailable(format!("row {row}: invalid energy '{}': {e}", cell(energy_idx)))
        })?;
        records.push(build_record(
            row,
            cell(date_idx),
            cell(charge_type_idx),
            hour,
            energy,
        )?);
    }
    Ok(records)
}

/// Reads a wide-form CSV with one row per (date, charge type) and one column
/// per hour, headed `<hour><suffix>` (e.g. `0시` .. `23시`), melting it into
/// one record per filled hour cell. Blank cells are missing observations and
/// are skipped.
pub fn read_wide_csv<R: Read>(
    reader: R,
    mapping: &SchemaMapping,
    hour_suffix: &str,
) -> Result<Vec<LoadRecord>, LoadError> {
    mapping.require(&[Field::Date, Field::ChargeType])?;
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| unavailable(format!("failed to read CSV headers: {e}")))?
        .clone();

    let date_idx = header_index(&headers, mapping.required_column(Field::Date)?)?;
    let charge_type_idx = header_index(&headers, mapping.required_column(Field::ChargeType)?)?;

    let mut hour_columns = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if idx == date_idx || idx == charge_type_idx {
            continue;
        }
        let header = header.trim();
        let Some(prefix) = header.strip_suffix(hour_suffix) else {
            continue;
        };
        let hour: i64 = prefix
            .trim()
            .parse()
            .map_err(|_| unavailable(format!("hour column '{header}' has no hour number")))?;
        hour_columns.push((idx, hour));
    }
    if hour_columns.is_empty() {
        return Err(unavailable(format!(
            "no hour columns ending in '{hour_suffix}'"
        )));
    }

    let mut records = Vec::new();
    for (n, line) in reader.records().enumerate() {
        let line = line.map_err(|e| unavailable(format!("failed to read CSV record: {e}")))?;
        let row = row_number(&line, n);
        let date = line.get(date_idx).unwrap_or("");
        let charge_type = line.get(charge_type_idx).unwrap_or("");

        for &(idx, hour) in &hour_columns {
            let raw = line.get(idx).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            let energy: f64 = raw
                .parse()
                .map_err(|e| unavailable(format!("row {row}: invalid energy '{raw}': {e}")))?;
            records.push(build_record(row, date, charge_type, hour, energy)?);
        }
    }
    Ok(records)
}

fn open_csv(path: &Path) -> Result<File, LoadError> {
    File::open(path)
        .map_err(|e| unavailable(format!("failed to open '{}': {e}", path.display())))
}

/// Long-form CSV file.
#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    mapping: SchemaMapping,
}

impl CsvSource {
    pub fn new<P: Into<PathBuf>>(path: P, mapping: SchemaMapping) -> Result<Self, LoadError> {
        mapping.require(&Field::ALL)?;
        Ok(Self {
            path: path.into(),
            mapping,
        })
    }
}

impl LoadSource for CsvSource {
    fn cache_key(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&self) -> Result<Vec<LoadRecord>, LoadError> {
        let records = read_long_csv(open_csv(&self.path)?, &self.mapping)?;
        tracing::info!(path = %self.path.display(), records = records.len(), "loaded long CSV");
        Ok(records)
    }
}

/// Wide-form CSV file, the layout of the published daily extracts.
#[derive(Debug)]
pub struct WideCsvSource {
    path: PathBuf,
    mapping: SchemaMapping,
    hour_suffix: String,
}

impl WideCsvSource {
    pub const DEFAULT_HOUR_SUFFIX: &'static str = "시";

    pub fn new<P: Into<PathBuf>>(
        path: P,
        mapping: SchemaMapping,
        hour_suffix: impl Into<String>,
    ) -> Result<Self, LoadError> {
        mapping.require(&[Field::Date, Field::ChargeType])?;
        let hour_suffix = hour_suffix.into();
        if hour_suffix.is_empty() {
            return Err(unavailable("hour column suffix must not be empty"));
        }
        Ok(Self {
            path: path.into(),
            mapping,
            hour_suffix,
        })
    }
}

impl LoadSource for WideCsvSource {
    fn cache_key(&self) -> String {
        format!("wide_csv:{}", self.path.display())
    }

    fn load(&self) -> Result<Vec<LoadRecord>, LoadError> {
        let records = read_wide_csv(open_csv(&self.path)?, &self.mapping, &self.hour_suffix)?;
        tracing::info!(path = %self.path.display(), records = records.len(), "loaded wide CSV");
        Ok(records)
    }
}

/// A table in a SQLite database. The connection belongs to the caller.
#[derive(Debug)]
pub struct SqliteSource<'c> {
    conn: &'c Connection,
    table: String,
    mapping: SchemaMapping,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl<'c> SqliteSource<'c> {
    pub fn new(
        conn: &'c Connection,
        table: impl Into<String>,
        mapping: SchemaMapping,
    ) -> Result<Self, LoadError> {
        mapping.require(&Field::ALL)?;
        Ok(Self {
            conn,
            table: table.into(),
            mapping,
        })
    }

    fn select_sql(&self) -> Result<String, LoadError> {
        let columns = Field::ALL
            .iter()
            .map(|field| self.mapping.required_column(*field).map(quote_ident))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(&self.table)
        ))
    }
}

impl LoadSource for SqliteSource<'_> {
    // In-memory databases have no path, so the connection itself identifies them.
    fn cache_key(&self) -> String {
        match self.conn.path().filter(|path| !path.is_empty()) {
            Some(path) => format!("sqlite:{path}:{}", self.table),
            None => format!("sqlite:{:p}:{}", self.conn, self.table),
        }
    }

    fn load(&self) -> Result<Vec<LoadRecord>, LoadError> {
        let sql = self.select_sql()?;
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| unavailable(format!("failed to query '{}': {e}", self.table)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })
            .map_err(|e| unavailable(format!("failed to query '{}': {e}", self.table)))?;

        let mut records = Vec::new();
        for (n, row) in rows.enumerate() {
            let row_no = n as u64 + 1;
            let (date, charge_type, hour, energy) =
                row.map_err(|e| unavailable(format!("row {row_no}: {e}")))?;
            records.push(build_record(row_no, &date, &charge_type, hour, energy)?);
        }
        tracing::info!(table = %self.table, records = records.len(), "loaded SQLite table");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_mapping() -> SchemaMapping {
        SchemaMapping::from_source_columns([
            ("day", Field::Date),
            ("type", Field::ChargeType),
            ("hour", Field::Hour),
            ("kWh", Field::EnergyKwh),
        ])
        .unwrap()
    }

    fn wide_mapping() -> SchemaMapping {
        SchemaMapping::from_source_columns([("일자", Field::Date), ("충전방식", Field::ChargeType)])
            .unwrap()
    }

    fn assert_unavailable<T: std::fmt::Debug>(res: Result<T, LoadError>) {
        assert!(
            matches!(res, Err(LoadError::DataUnavailable(_))),
            "expected DataUnavailable, got {res:?}"
        );
    }

    #[test]
    fn duplicate_canonical_mapping_is_rejected() {
        let res = SchemaMapping::from_source_columns([("a", Field::Hour), ("b", Field::Hour)]);
        assert_unavailable(res);
    }

    #[test]
    fn sources_validate_mapping_eagerly() {
        assert_unavailable(CsvSource::new("missing.csv", wide_mapping()));
        assert!(WideCsvSource::new("missing.csv", wide_mapping(), "시").is_ok());
        assert_unavailable(WideCsvSource::new("missing.csv", wide_mapping(), ""));
    }

    #[test]
    fn long_csv_maps_source_columns() {
        let data = "kWh,hour,type,day\n10.5,9,DC,2024-01-02\n3,23,AC,2024-01-03 00:00:00\n";
        let records = read_long_csv(data.as_bytes(), &long_mapping()).unwrap();
        assert_eq!(
            records,
            vec![
                LoadRecord {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    charge_type: "DC".to_string(),
                    hour: 9,
                    energy_kwh: 10.5,
                },
                LoadRecord {
                    date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                    charge_type: "AC".to_string(),
                    hour: 23,
                    energy_kwh: 3.,
                },
            ]
        );
    }

    #[test]
    fn header_only_csv_is_empty_not_an_error() {
        let records = read_long_csv("day,type,hour,kWh\n".as_bytes(), &long_mapping()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_column_is_unavailable() {
        assert_unavailable(read_long_csv(
            "day,type,kWh\n2024-01-01,DC,1\n".as_bytes(),
            &long_mapping(),
        ));
    }

    #[test]
    fn malformed_rows_are_unavailable() {
        let header = "day,type,hour,kWh\n";
        for row in [
            "2024-01-01,DC,24,1",
            "2024-01-01,DC,-1,1",
            "2024-01-01,DC,nine,1",
            "2024-01-01,DC,9,-0.5",
            "2024-01-01,DC,9,",
            "01/02/2024,DC,9,1",
            "2024-01-01, ,9,1",
        ] {
            let data = format!("{header}{row}\n");
            assert_unavailable(read_long_csv(data.as_bytes(), &long_mapping()));
        }
    }

    #[test]
    fn wide_csv_melts_hour_columns() {
        let data = "\u{feff}일자,충전방식,0시,1시,23시\n\
                    2024-01-01,급속,1.5,,4\n\
                    2024-01-02,완속,0,2,\n";
        let records = read_wide_csv(data.as_bytes(), &wide_mapping(), "시").unwrap();
        let summary = records
            .iter()
            .map(|r| (r.charge_type.as_str(), r.hour, r.energy_kwh))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![("급속", 0, 1.5), ("급속", 23, 4.), ("완속", 0, 0.), ("완속", 1, 2.)]
        );
        assert!(records[..2]
            .iter()
            .all(|r| r.date == NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }

    #[test]
    fn wide_csv_without_hour_columns_is_unavailable() {
        let data = "일자,충전방식,total\n2024-01-01,급속,3\n";
        assert_unavailable(read_wide_csv(data.as_bytes(), &wide_mapping(), "시"));
    }

    #[test]
    fn wide_csv_mapped_columns_are_not_hour_columns() {
        let mapping =
            SchemaMapping::from_source_columns([("일시", Field::Date), ("충전방식", Field::ChargeType)])
                .unwrap();
        let data = "일시,충전방식,0시,1시\n2024-01-01,급속,3,4\n";
        let records = read_wide_csv(data.as_bytes(), &mapping, "시").unwrap();
        assert_eq!(
            records.iter().map(|r| (r.hour, r.energy_kwh)).collect::<Vec<_>>(),
            vec![(0, 3.), (1, 4.)]
        );
    }

    #[test]
    fn wide_csv_rejects_unnumbered_hour_column() {
        let data = "일자,충전방식,0시,합계시\n2024-01-01,급속,3,3\n";
        assert_unavailable(read_wide_csv(data.as_bytes(), &wide_mapping(), "시"));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let source = CsvSource::new("/nonexistent/ev_load.csv", long_mapping()).unwrap();
        assert_unavailable(source.load());
    }

    fn sqlite_with_rows(rows: &[(&str, &str, i64, f64)]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"CREATE TABLE "ev load" (day TEXT, type TEXT, hour INTEGER, "kWh" REAL);"#)
            .unwrap();
        for (day, charge_type, hour, kwh) in rows {
            conn.execute(
                r#"INSERT INTO "ev load" VALUES (?1, ?2, ?3, ?4)"#,
                rusqlite::params![day, charge_type, hour, kwh],
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn sqlite_source_reads_mapped_columns() {
        let conn = sqlite_with_rows(&[("2024-01-01", "DC", 9, 10.), ("2024-01-02", "DC", 9, 14.)]);
        let source = SqliteSource::new(&conn, "ev load", long_mapping()).unwrap();
        let records = source.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].energy_kwh, 14.);
        assert!(source.cache_key().ends_with(":ev load"));
    }

    #[test]
    fn sqlite_cache_key_identifies_the_database() {
        let first = sqlite_with_rows(&[]);
        let second = sqlite_with_rows(&[]);
        let a = SqliteSource::new(&first, "ev load", long_mapping()).unwrap();
        let b = SqliteSource::new(&second, "ev load", long_mapping()).unwrap();
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(
            a.cache_key(),
            SqliteSource::new(&first, "ev load", long_mapping()).unwrap().cache_key()
        );

        let dir = std::env::temp_dir();
        let paths = ["a", "b"].map(|name| {
            dir.join(format!("charge_congestion_{}_{name}.db", std::process::id()))
        });
        let keys = paths
            .iter()
            .map(|path| {
                let conn = Connection::open(path).unwrap();
                let source = SqliteSource::new(&conn, "ev load", long_mapping()).unwrap();
                source.cache_key()
            })
            .collect::<Vec<_>>();
        assert_ne!(keys[0], keys[1]);
        for path in &paths {
            std::fs::remove_file(path).ok();
        }
    }

    #[test]
    fn sqlite_empty_table_is_empty() {
        let conn = sqlite_with_rows(&[]);
        let source = SqliteSource::new(&conn, "ev load", long_mapping()).unwrap();
        assert!(source.load().unwrap().is_empty());
    }

    #[test]
    fn sqlite_missing_table_is_unavailable() {
        let conn = Connection::open_in_memory().unwrap();
        let source = SqliteSource::new(&conn, "ev_load", long_mapping()).unwrap();
        assert_unavailable(source.load());
    }

    #[test]
    fn sqlite_out_of_range_hour_is_unavailable() {
        let conn = sqlite_with_rows(&[("2024-01-01", "DC", 30, 1.)]);
        let source = SqliteSource::new(&conn, "ev load", long_mapping()).unwrap();
        assert_unavailable(source.load());
    }
}
