//! Tabular previews of each stage's output, printed when a run is asked to show rows.

use std::io::Write;

use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use salesflow_parser::SALES_COLUMNS;
use tracing::warn;

use crate::pipeline::StageObserver;
use crate::types::{ClassifiedRecord, Record, RegionTierSummary};
use crate::writer::AGGREGATED_COLUMNS;

const NULL: &str = "null";

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| NULL.to_string(), |v| v.to_string())
}

fn new_table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(header.into_iter().map(|name| name.to_string()).collect::<Vec<_>>());
    table
}

pub fn source_table(records: &[Record]) -> Table {
    let mut table = new_table(SALES_COLUMNS);
    for record in records {
        table.add_row(vec![
            cell(record.customer_id),
            cell(record.customer_name.as_deref()),
            cell(record.product_id.as_deref()),
            cell(record.product_name.as_deref()),
            cell(record.purchase_amount),
            cell(record.region.as_deref()),
        ]);
    }
    table
}

pub fn transformed_table(records: &[ClassifiedRecord]) -> Table {
    let mut table = new_table(SALES_COLUMNS.into_iter().chain(["customer_tier"]));
    for classified in records {
        let record = &classified.record;
        table.add_row(vec![
            cell(record.customer_id),
            cell(record.customer_name.as_deref()),
            cell(record.product_id.as_deref()),
            cell(record.product_name.as_deref()),
            record.purchase_amount.to_string(),
            cell(record.region.as_deref()),
            classified.customer_tier.to_string(),
        ]);
    }
    table
}

pub fn aggregated_table(summaries: &[RegionTierSummary]) -> Table {
    let mut table = new_table(AGGREGATED_COLUMNS);
    for summary in summaries {
        table.add_row(vec![
            cell(summary.region.as_deref()),
            summary.customer_tier.to_string(),
            summary.total_revenue.to_string(),
            summary.customer_count.to_string(),
        ]);
    }
    table
}

/// Writes the first `rows` rows of every stage to `out`.
pub struct PreviewObserver<W: Write> {
    rows: usize,
    out: W,
}

impl<W: Write> PreviewObserver<W> {
    pub fn new(rows: usize, out: W) -> Self {
        Self { rows, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, title: &str, table: Table) {
        if self.rows == 0 {
            return;
        }
        if let Err(err) = writeln!(self.out, "{title}\n{table}") {
            warn!("failed to write preview: {err}");
        }
    }
}

impl<W: Write> StageObserver for PreviewObserver<W> {
    fn source_sample_size(&self) -> usize {
        self.rows
    }

    fn on_source(&mut self, sample: &[Record]) {
        let table = source_table(sample);
        self.emit("Source data loaded:", table);
    }

    fn on_transformed(&mut self, records: &[ClassifiedRecord]) {
        let table = transformed_table(&records[..records.len().min(self.rows)]);
        self.emit("Transformed data:", table);
    }

    fn on_aggregated(&mut self, summaries: &[RegionTierSummary]) {
        let mut ordered = summaries.to_vec();
        ordered.sort_by(|a, b| a.key().cmp(&b.key()));
        ordered.truncate(self.rows);
        let table = aggregated_table(&ordered);
        self.emit("Aggregated data by region and tier:", table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CleanedRecord, CustomerTier};

    fn classified(name: &str, amount: f64) -> ClassifiedRecord {
        ClassifiedRecord {
            record: CleanedRecord {
                customer_id: None,
                customer_name: Some(name.into()),
                product_id: Some("P1".into()),
                product_name: None,
                purchase_amount: amount,
                region: Some("US".into()),
            },
            customer_tier: crate::classifier::classify_amount(amount),
        }
    }

    #[test]
    fn preview_limits_rows_and_prints_nulls() {
        let mut observer = PreviewObserver::new(1, Vec::new());
        observer.on_transformed(&[classified("Ada", 1200.0), classified("Bob", 20.0)]);
        let text = String::from_utf8(observer.into_inner()).expect("utf8 output");

        assert!(text.starts_with("Transformed data:"));
        assert!(text.contains("Ada"));
        assert!(text.contains("Premium"));
        assert!(text.contains(NULL));
        assert!(!text.contains("Bob"));
    }

    #[test]
    fn zero_rows_prints_nothing() {
        let mut observer = PreviewObserver::new(0, Vec::new());
        observer.on_aggregated(&[RegionTierSummary {
            region: Some("US".into()),
            customer_tier: CustomerTier::Gold,
            total_revenue: 1300.0,
            customer_count: 2,
        }]);
        assert_eq!(observer.source_sample_size(), 0);
        assert!(observer.into_inner().is_empty());
    }
}
