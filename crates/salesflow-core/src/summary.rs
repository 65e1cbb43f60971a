use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{ClassifiedRecord, CustomerTier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub premium: usize,
    pub gold: usize,
    pub standard: usize,
}

impl TierCounts {
    pub fn from_records(records: &[ClassifiedRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            counts.record(record.customer_tier);
        }
        counts
    }

    pub fn record(&mut self, tier: CustomerTier) {
        match tier {
            CustomerTier::Premium => self.premium += 1,
            CustomerTier::Gold => self.gold += 1,
            CustomerTier::Standard => self.standard += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.premium + self.gold + self.standard
    }
}

/// Row accounting for one pass over the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    pub tier_counts: TierCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_path: PathBuf,
    pub transformed_path: PathBuf,
    pub aggregated_path: PathBuf,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub rows_written: usize,
    pub partitions_written: usize,
    pub groups_written: usize,
    pub tier_counts: TierCounts,
}
