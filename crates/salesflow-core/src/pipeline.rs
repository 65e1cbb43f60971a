use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use salesflow_parser::{read_records, ParserError};
use tracing::{info, info_span, warn, Span};
use uuid::Uuid;

use crate::aggregator;
use crate::classifier::classify_all;
use crate::cleaner::clean_all;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::summary::{BatchStats, RunSummary, TierCounts};
use crate::types::{ClassifiedRecord, Record, RegionTierSummary};
use crate::writer::{self, WriteReport};

/// Hooks invoked as data moves between stages. All methods default to doing nothing.
pub trait StageObserver {
    /// How many raw source rows to keep for [`StageObserver::on_source`].
    fn source_sample_size(&self) -> usize {
        0
    }

    fn on_source(&mut self, _sample: &[Record]) {}

    fn on_transformed(&mut self, _records: &[ClassifiedRecord]) {}

    fn on_aggregated(&mut self, _summaries: &[RegionTierSummary]) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub records: Vec<ClassifiedRecord>,
    pub stats: BatchStats,
    pub source_sample: Vec<Record>,
}

/// Validates, cleans and classifies a record stream. The first row error aborts the batch.
pub fn classify_source<I>(records: I, sample_size: usize) -> Result<LoadedBatch>
where
    I: IntoIterator<Item = std::result::Result<Record, ParserError>>,
{
    let mut failure: Option<ParserError> = None;
    let mut rows_read = 0usize;
    let mut source_sample = Vec::with_capacity(sample_size.min(1024));

    let parsed = records
        .into_iter()
        .map_while(|row| match row {
            Ok(record) => Some(record),
            Err(err) => {
                failure = Some(err);
                None
            }
        })
        .inspect(|record| {
            rows_read += 1;
            if source_sample.len() < sample_size {
                source_sample.push(record.clone());
            }
        });

    let classified: Vec<ClassifiedRecord> = classify_all(clean_all(parsed)).collect();

    if let Some(err) = failure {
        return Err(err.into());
    }

    let stats = BatchStats {
        rows_read,
        rows_kept: classified.len(),
        rows_dropped: rows_read - classified.len(),
        tier_counts: TierCounts::from_records(&classified),
    };

    Ok(LoadedBatch {
        records: classified,
        stats,
        source_sample,
    })
}

pub fn load_source(path: &Path, sample_size: usize) -> Result<LoadedBatch> {
    let reader = read_records(path)?;
    classify_source(reader, sample_size)
}

/// Explicit handle for one pipeline run. Every stage runs inside the session's
/// `pipeline_run` span; dropping the session closes the run, on success or failure.
#[derive(Debug)]
pub struct PipelineSession {
    config: PipelineConfig,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    clock: Instant,
    span: Span,
}

impl PipelineSession {
    pub fn open(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        span.in_scope(|| {
            info!(
                source = %config.source_path.display(),
                transformed = %config.transformed_path.display(),
                aggregated = %config.aggregated_path.display(),
                shuffle_partitions = config.shuffle_partitions.get(),
                "pipeline session opened"
            )
        });

        Ok(Self {
            config,
            run_id,
            started_at: Utc::now(),
            clock: Instant::now(),
            span,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn load(&self, sample_size: usize) -> Result<LoadedBatch> {
        let _entered = self.span.enter();
        let batch = load_source(&self.config.source_path, sample_size)?;
        info!(
            rows_read = batch.stats.rows_read,
            rows_kept = batch.stats.rows_kept,
            rows_dropped = batch.stats.rows_dropped,
            "source validated, cleaned and classified"
        );
        Ok(batch)
    }

    pub fn aggregate(&self, records: &[ClassifiedRecord]) -> Vec<RegionTierSummary> {
        let _entered = self.span.enter();
        let summaries = aggregator::aggregate(records, self.config.shuffle_partitions);
        info!(groups = summaries.len(), "aggregation complete");
        summaries
    }

    pub fn write_transformed(&self, records: &[ClassifiedRecord]) -> Result<WriteReport> {
        let _entered = self.span.enter();
        writer::write_transformed(&self.config.transformed_path, records)
    }

    pub fn write_aggregated(&self, summaries: &[RegionTierSummary]) -> Result<WriteReport> {
        let _entered = self.span.enter();
        writer::write_aggregated(&self.config.aggregated_path, summaries)
    }

    /// Runs every stage in order: load, write transformed, aggregate, write aggregated.
    pub fn run(&self, observer: &mut dyn StageObserver) -> Result<RunSummary> {
        let batch = self.load(observer.source_sample_size())?;
        observer.on_source(&batch.source_sample);
        observer.on_transformed(&batch.records);

        let transformed = self.write_transformed(&batch.records)?;
        let summaries = self.aggregate(&batch.records);
        observer.on_aggregated(&summaries);
        let aggregated = self.write_aggregated(&summaries)?;

        Ok(self.summarize(&batch.stats, &transformed, &aggregated))
    }

    /// Like [`PipelineSession::run`], but file I/O runs on blocking tasks and the aggregation
    /// is sharded across `shards` tasks while the transformed dataset is being written.
    #[cfg(feature = "runtime")]
    pub async fn run_concurrent(
        self: std::sync::Arc<Self>,
        shards: std::num::NonZeroUsize,
        observer: &mut dyn StageObserver,
    ) -> Result<RunSummary> {
        use std::sync::Arc;
        use tokio::task;

        let sample_size = observer.source_sample_size();
        let session = Arc::clone(&self);
        let batch = task::spawn_blocking(move || session.load(sample_size)).await??;
        observer.on_source(&batch.source_sample);
        observer.on_transformed(&batch.records);

        let stats = batch.stats;
        let records: Arc<[ClassifiedRecord]> = batch.records.into();

        let session = Arc::clone(&self);
        let shared = Arc::clone(&records);
        let transformed = task::spawn_blocking(move || session.write_transformed(&shared));

        let summaries = aggregator::aggregate_concurrently(
            Arc::clone(&records),
            shards,
            self.config.shuffle_partitions,
        )
        .await;

        // The transformed write is settled before any aggregation error is returned.
        let transformed = transformed.await?;
        let summaries = match summaries {
            Ok(summaries) => summaries,
            Err(err) => {
                self.span.in_scope(|| {
                    warn!(
                        transformed_written = transformed.is_ok(),
                        "aggregation failed after the transformed write settled: {err}"
                    )
                });
                return Err(err);
            }
        };
        let transformed = transformed?;
        self.span
            .in_scope(|| info!(groups = summaries.len(), shards = shards.get(), "aggregation complete"));

        observer.on_aggregated(&summaries);

        let session = Arc::clone(&self);
        let aggregated =
            task::spawn_blocking(move || session.write_aggregated(&summaries)).await??;

        Ok(self.summarize(&stats, &transformed, &aggregated))
    }

    fn summarize(
        &self,
        stats: &BatchStats,
        transformed: &WriteReport,
        aggregated: &WriteReport,
    ) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            source_path: self.config.source_path.clone(),
            transformed_path: transformed.destination.clone(),
            aggregated_path: aggregated.destination.clone(),
            rows_read: stats.rows_read,
            rows_dropped: stats.rows_dropped,
            rows_written: transformed.rows_written,
            partitions_written: transformed.files.len(),
            groups_written: aggregated.rows_written,
            tier_counts: stats.tier_counts,
        }
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        let elapsed_ms = self.clock.elapsed().as_millis() as u64;
        self.span
            .in_scope(|| info!(elapsed_ms, "pipeline session closed"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CustomerTier;

    fn record(amount: Option<f64>, region: &str) -> Record {
        Record {
            customer_id: Some(1),
            customer_name: Some(" name ".into()),
            product_id: None,
            product_name: None,
            purchase_amount: amount,
            region: Some(region.into()),
        }
    }

    #[test]
    fn classify_source_counts_kept_and_dropped_rows() {
        let rows = vec![
            Ok(record(Some(1500.0), "us")),
            Ok(record(Some(0.0), "us")),
            Ok(record(None, "eu")),
            Ok(record(Some(600.0), "eu")),
        ];
        let batch = classify_source(rows, 2).expect("batch should load");

        assert_eq!(batch.stats.rows_read, 4);
        assert_eq!(batch.stats.rows_kept, 2);
        assert_eq!(batch.stats.rows_dropped, 2);
        assert_eq!(batch.stats.tier_counts.premium, 1);
        assert_eq!(batch.stats.tier_counts.gold, 1);
        assert_eq!(batch.source_sample.len(), 2);
        assert_eq!(batch.records[0].customer_tier, CustomerTier::Premium);
        assert_eq!(batch.records[0].region(), Some("US"));
        assert_eq!(batch.records[1].record.customer_name.as_deref(), Some("name"));
    }

    #[test]
    fn classify_source_stops_at_first_row_error() {
        let rows = vec![
            Ok(record(Some(10.0), "us")),
            Err(ParserError::ColumnCount {
                line: 3,
                expected: 6,
                found: 2,
            }),
            Ok(record(Some(20.0), "us")),
        ];
        let err = classify_source(rows, 0).expect_err("row error must abort");
        assert!(err.to_string().contains("line 3"));
        assert_eq!(err.stage(), "extract");
    }
}
