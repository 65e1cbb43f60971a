//! Parquet output for both datasets.
//!
//! Every write first discards whatever is at the destination, then writes data files and
//! finally an empty `_SUCCESS` marker. Rows are sorted before encoding so that identical input
//! produces identical files.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::{Column, DataFrame, NamedFrom, PolarsResult, Series};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::types::{ClassifiedRecord, RegionTierSummary};

pub const PART_FILE_NAME: &str = "part-00000.parquet";
pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const PARTITION_COLUMN: &str = "region";
/// Directory value used for records whose region is null or empty.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Columns stored inside each transformed partition file; `region` lives in the directory name.
pub const TRANSFORMED_FILE_COLUMNS: [&str; 6] = [
    "customer_id",
    "customer_name",
    "product_id",
    "product_name",
    "purchase_amount",
    "customer_tier",
];

pub const AGGREGATED_COLUMNS: [&str; 4] = [
    "region",
    "customer_tier",
    "total_revenue",
    "customer_count",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub destination: PathBuf,
    pub rows_written: usize,
    pub files: Vec<PathBuf>,
}

/// Writes classified records under `destination`, one `region=<value>` directory per region.
pub fn write_transformed(destination: &Path, records: &[ClassifiedRecord]) -> Result<WriteReport> {
    prepare_destination(destination)?;

    let mut partitions: BTreeMap<Option<&str>, Vec<&ClassifiedRecord>> = BTreeMap::new();
    for record in records {
        let region = record.region().filter(|region| !region.is_empty());
        partitions.entry(region).or_default().push(record);
    }

    let mut files = Vec::with_capacity(partitions.len());
    for (region, mut rows) in partitions {
        rows.sort_by(|a, b| compare_records(a, b));

        let partition_dir = destination.join(partition_dir_name(region));
        fs::create_dir_all(&partition_dir).map_err(|err| {
            PipelineError::write_failure(&partition_dir, format!("failed to create partition: {err}"))
        })?;

        let path = partition_dir.join(PART_FILE_NAME);
        let mut df = transformed_frame(&rows).map_err(|err| PipelineError::write_failure(&path, err))?;
        write_parquet(&path, &mut df)?;
        debug!(partition = region.unwrap_or(NULL_PARTITION), rows = rows.len(), "wrote partition");
        files.push(path);
    }

    mark_success(destination)?;
    info!(
        destination = %destination.display(),
        rows = records.len(),
        partitions = files.len(),
        "transformed dataset written"
    );

    Ok(WriteReport {
        destination: destination.to_path_buf(),
        rows_written: records.len(),
        files,
    })
}

/// Writes the summaries as a single flat file under `destination`.
pub fn write_aggregated(destination: &Path, summaries: &[RegionTierSummary]) -> Result<WriteReport> {
    prepare_destination(destination)?;

    let mut rows: Vec<&RegionTierSummary> = summaries.iter().collect();
    rows.sort_by(|a, b| {
        (a.region.as_deref(), a.customer_tier).cmp(&(b.region.as_deref(), b.customer_tier))
    });

    let path = destination.join(PART_FILE_NAME);
    let mut df = aggregated_frame(&rows).map_err(|err| PipelineError::write_failure(&path, err))?;
    write_parquet(&path, &mut df)?;
    mark_success(destination)?;

    info!(
        destination = %destination.display(),
        groups = rows.len(),
        "aggregated dataset written"
    );

    Ok(WriteReport {
        destination: destination.to_path_buf(),
        rows_written: rows.len(),
        files: vec![path],
    })
}

pub fn partition_dir_name(region: Option<&str>) -> String {
    match region {
        Some(value) if !value.is_empty() => {
            format!("{PARTITION_COLUMN}={}", escape_partition_value(value))
        }
        _ => format!("{PARTITION_COLUMN}={NULL_PARTITION}"),
    }
}

/// Percent-encodes characters that are unsafe in a directory name.
pub fn escape_partition_value(value: &str) -> String {
    const RESERVED: &[char] = &[
        '"', '#', '%', '\'', '*', '/', ':', '=', '?', '\\', '[', ']', '^', '{', '}', '<', '>',
        '|',
    ];

    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_control() || RESERVED.contains(&ch) {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{byte:02X}"));
            }
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

fn prepare_destination(destination: &Path) -> Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.is_dir() => {
            warn!(destination = %destination.display(), "overwriting existing destination");
            fs::remove_dir_all(destination).map_err(|err| {
                PipelineError::write_failure(destination, format!("failed to clear destination: {err}"))
            })?;
        }
        Ok(_) => {
            return Err(PipelineError::write_failure(
                destination,
                "destination exists and is not a directory",
            ));
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(PipelineError::write_failure(
                destination,
                format!("failed to inspect destination: {err}"),
            ));
        }
    }

    fs::create_dir_all(destination).map_err(|err| {
        PipelineError::write_failure(destination, format!("failed to create destination: {err}"))
    })
}

fn mark_success(destination: &Path) -> Result<()> {
    let marker = destination.join(SUCCESS_MARKER);
    File::create(&marker)
        .map(|_| ())
        .map_err(|err| PipelineError::write_failure(&marker, format!("failed to write marker: {err}")))
}

fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<()> {
    let file = File::create(path)
        .map_err(|err| PipelineError::write_failure(path, format!("failed to create file: {err}")))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .with_statistics(StatisticsOptions::default())
        .finish(df)
        .map_err(|err| PipelineError::write_failure(path, err))?;
    Ok(())
}

fn compare_records(a: &ClassifiedRecord, b: &ClassifiedRecord) -> Ordering {
    let (a, b) = (&a.record, &b.record);
    a.customer_id
        .cmp(&b.customer_id)
        .then_with(|| a.customer_name.cmp(&b.customer_name))
        .then_with(|| a.product_id.cmp(&b.product_id))
        .then_with(|| a.product_name.cmp(&b.product_name))
        .then_with(|| a.purchase_amount.total_cmp(&b.purchase_amount))
}

fn transformed_frame(rows: &[&ClassifiedRecord]) -> PolarsResult<DataFrame> {
    let customer_id: Vec<Option<i32>> = rows.iter().map(|r| r.record.customer_id).collect();
    let customer_name: Vec<Option<&str>> =
        rows.iter().map(|r| r.record.customer_name.as_deref()).collect();
    let product_id: Vec<Option<&str>> =
        rows.iter().map(|r| r.record.product_id.as_deref()).collect();
    let product_name: Vec<Option<&str>> =
        rows.iter().map(|r| r.record.product_name.as_deref()).collect();
    let purchase_amount: Vec<f64> = rows.iter().map(|r| r.record.purchase_amount).collect();
    let customer_tier: Vec<&str> = rows.iter().map(|r| r.customer_tier.as_str()).collect();

    let [id_col, name_col, product_id_col, product_name_col, amount_col, tier_col] =
        TRANSFORMED_FILE_COLUMNS;
    let columns: Vec<Column> = vec![
        Series::new(id_col.into(), customer_id).into(),
        Series::new(name_col.into(), customer_name).into(),
        Series::new(product_id_col.into(), product_id).into(),
        Series::new(product_name_col.into(), product_name).into(),
        Series::new(amount_col.into(), purchase_amount).into(),
        Series::new(tier_col.into(), customer_tier).into(),
    ];
    DataFrame::new(columns)
}

fn aggregated_frame(rows: &[&RegionTierSummary]) -> PolarsResult<DataFrame> {
    let region: Vec<Option<&str>> = rows.iter().map(|r| r.region.as_deref()).collect();
    let customer_tier: Vec<&str> = rows.iter().map(|r| r.customer_tier.as_str()).collect();
    let total_revenue: Vec<f64> = rows.iter().map(|r| r.total_revenue).collect();
    let customer_count: Vec<i64> = rows
        .iter()
        .map(|r| i64::try_from(r.customer_count).unwrap_or(i64::MAX))
        .collect();

    let [region_col, tier_col, revenue_col, count_col] = AGGREGATED_COLUMNS;
    DataFrame::new(vec![
        Series::new(region_col.into(), region).into(),
        Series::new(tier_col.into(), customer_tier).into(),
        Series::new(revenue_col.into(), total_revenue).into(),
        Series::new(count_col.into(), customer_count).into(),
    ])
}
