use charge_congestion::{
    cache::TtlCache,
    config::{AppConfig, SourceConfig},
    convert,
    dashboard::{self, CongestionBoard, PageState},
    graph::Graphing,
    load::{CsvSource, LoadError, LoadSource, SchemaMapping, SqliteSource, WideCsvSource},
    observability,
    record::{Field, LoadRecord},
};
use chrono::Timelike;
use clap::Parser;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

#[derive(clap::Args, Debug)]
struct Common {
    /// TOML file describing the data source. Falls back to
    /// $CONGESTION_CONFIG, then congestion.toml.
    #[clap(short, long, env = "CONGESTION_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
enum Args {
    /// Takes the wide daily charging-load extract (one column per hour,
    /// headed `0시` .. `23시`) and rewrites it as one row per observation.
    // cargo run melt-csv data/ev_load_2024.csv data/ev_load_long.csv
    MeltCsv {
        /// Wide extract to read.
        wide_csv: PathBuf,

        /// Where the long-form csv is written.
        csv_out: PathBuf,

        /// Suffix that marks hour columns.
        #[clap(long, default_value = "시")]
        hour_suffix: String,

        /// Header of the date column.
        #[clap(long, default_value = "일자")]
        date_column: String,

        /// Header of the charge type column.
        #[clap(long, default_value = "충전방식")]
        charge_type_column: String,
    },

    /// Lists the charge types available for selection.
    // cargo run charge-types -c congestion.toml
    ChargeTypes {
        #[clap(flatten)]
        common: Common,
    },

    /// Shows the congestion level of a charge type for the current local
    /// hour, or for --hour if given.
    // cargo run current 급속 --hour 18
    Current {
        charge_type: String,

        /// Hour of day (0-23) to look up instead of the wall clock.
        #[clap(long, value_parser = clap::value_parser!(u8).range(0..24))]
        hour: Option<u8>,

        #[clap(flatten)]
        common: Common,
    },

    /// Writes the classified (charge type, hour) table to a csv.
    // cargo run write-levels results/levels.csv
    WriteLevels {
        csv_out: PathBuf,

        #[clap(flatten)]
        common: Common,
    },

    /// Writes one charge type's average load per hour to a csv.
    // cargo run write-series 급속 results/fast_series.csv
    WriteSeries {
        charge_type: String,
        csv_out: PathBuf,

        #[clap(flatten)]
        common: Common,
    },

    /// Renders one charge type's hourly profile as a png, bars coloured
    /// by congestion level.
    // cargo run graph-series 급속 results/fast.png
    GraphSeries {
        charge_type: String,
        output_png: PathBuf,

        #[clap(flatten)]
        common: Common,
    },
}

fn run_pass<S: LoadSource>(
    source: Result<S, LoadError>,
    cache: &TtlCache<Vec<LoadRecord>>,
) -> PageState {
    match source {
        Ok(source) => dashboard::render_pass(&source, cache),
        Err(err) => unavailable(err),
    }
}

fn unavailable(err: LoadError) -> PageState {
    tracing::warn!(error = %err, "congestion data unavailable");
    err.into()
}

/// Builds the configured source and runs one render pass. Any failure to
/// reach the data ends up as `PageState::Unavailable`.
fn load_page(cfg: &AppConfig) -> PageState {
    let cache = TtlCache::new(cfg.cache.ttl());
    let mapping = match cfg.schema_mapping() {
        Ok(mapping) => mapping,
        Err(err) => return unavailable(err),
    };

    match &cfg.source {
        SourceConfig::Csv { path } => run_pass(CsvSource::new(path, mapping), &cache),
        SourceConfig::WideCsv { path, hour_suffix } => run_pass(
            WideCsvSource::new(path, mapping, hour_suffix.as_str()),
            &cache,
        ),
        SourceConfig::Sqlite { path, table } => {
            let conn = match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
                Ok(conn) => conn,
                Err(e) => {
                    return unavailable(LoadError::DataUnavailable(format!(
                        "failed to open '{}': {e}",
                        path.display()
                    )))
                }
            };
            run_pass(SqliteSource::new(&conn, table.as_str(), mapping), &cache)
        }
    }
}

/// Loads the page and prints the no-data / unavailable notice when there
/// is nothing to show.
fn with_board(
    common: &Common,
    f: impl FnOnce(&CongestionBoard) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let cfg = AppConfig::load(common.config.as_deref())?;
    match load_page(&cfg) {
        PageState::Ready(board) => f(&board),
        PageState::NoData => {
            println!("No charging data available yet.");
            Ok(())
        }
        PageState::Unavailable(reason) => {
            println!("Charging data is currently unavailable: {reason}");
            Ok(())
        }
    }
}

fn melt_csv(
    wide_csv: &Path,
    csv_out: &Path,
    hour_suffix: &str,
    date_column: &str,
    charge_type_column: &str,
) -> anyhow::Result<()> {
    let mapping = SchemaMapping::from_source_columns([
        (date_column, Field::Date),
        (charge_type_column, Field::ChargeType),
    ])?;
    let rows = convert::convert_wide_load_csv(wide_csv, csv_out, &mapping, hour_suffix)?;
    tracing::info!(rows, output = %csv_out.display(), "wrote long-form csv");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    observability::init_tracing();

    match Args::parse() {
        Args::MeltCsv {
            wide_csv,
            csv_out,
            hour_suffix,
            date_column,
            charge_type_column,
        } => {
            melt_csv(&wide_csv, &csv_out, &hour_suffix, &date_column, &charge_type_column)?;
        }
        Args::ChargeTypes { common } => {
            with_board(&common, |board| {
                for charge_type in board.charge_types() {
                    println!("{charge_type}");
                }
                Ok(())
            })?;
        }
        Args::Current {
            charge_type,
            hour,
            common,
        } => {
            // Local hour is always 0..=23.
            let hour = hour.unwrap_or_else(|| chrono::Local::now().hour() as u8);
            with_board(&common, |board| {
                match board.current_level(&charge_type, hour) {
                    Some(info) => {
                        println!(
                            "{} {:02}:00 {}: {}",
                            info.symbol, info.hour, info.charge_type, info.label
                        );
                        println!("{}", info.message);
                    }
                    None => println!("No data for '{charge_type}' at {hour:02}:00."),
                }
                Ok(())
            })?;
        }
        Args::WriteLevels { csv_out, common } => {
            with_board(&common, |board| {
                convert::write_classified_csv(&csv_out, board.classified())
            })?;
        }
        Args::WriteSeries {
            charge_type,
            csv_out,
            common,
        } => {
            with_board(&common, |board| {
                let series = board.hourly_series(&charge_type);
                if series.is_empty() {
                    println!("No data for '{charge_type}'.");
                }
                convert::write_series_csv(&csv_out, &series)
            })?;
        }
        Args::GraphSeries {
            charge_type,
            output_png,
            common,
        } => {
            with_board(&common, |board| {
                let hours = board.hours(&charge_type);
                if hours.is_empty() {
                    println!("No data for '{charge_type}'.");
                }
                Graphing::new(&output_png).hourly_congestion(&charge_type, &hours)
            })?;
        }
    }
    Ok(())
}
