//! Grouped revenue/volume statistics per `(region, customer_tier)`.
//!
//! Aggregation is split the way a shuffle would split it: every shard of input produces
//! partial sums bucketed by key hash into `shuffle_partitions` slots, and the slots are then
//! merged by addition. Because the partials only ever add, the result does not depend on how
//! the input was sharded.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use crate::types::{ClassifiedRecord, GroupKey, RegionTierSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialAggregate {
    pub total_revenue: f64,
    pub customer_count: u64,
}

impl PartialAggregate {
    pub fn observe(&mut self, purchase_amount: f64) {
        self.total_revenue += purchase_amount;
        self.customer_count += 1;
    }

    pub fn merge(&mut self, other: &PartialAggregate) {
        self.total_revenue += other.total_revenue;
        self.customer_count += other.customer_count;
    }
}

pub type PartialAggregates = HashMap<GroupKey, PartialAggregate>;

/// Counts every record in a group; `customer_id` is not consulted, so rows with a null id
/// still count.
pub fn aggregate_partials<'a, I>(records: I) -> PartialAggregates
where
    I: IntoIterator<Item = &'a ClassifiedRecord>,
{
    let mut partials = PartialAggregates::new();
    for record in records {
        partials
            .entry(record.group_key())
            .or_default()
            .observe(record.purchase_amount());
    }
    partials
}

pub fn merge_partials(mut into: PartialAggregates, other: PartialAggregates) -> PartialAggregates {
    for (key, partial) in other {
        into.entry(key).or_default().merge(&partial);
    }
    into
}

pub fn shuffle_partition(key: &GroupKey, partitions: NonZeroUsize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partitions.get() as u64) as usize
}

/// Map side of the shuffle: partial sums for one shard, bucketed by key hash.
pub fn partial_shuffle<'a, I>(records: I, partitions: NonZeroUsize) -> Vec<PartialAggregates>
where
    I: IntoIterator<Item = &'a ClassifiedRecord>,
{
    let mut buckets = vec![PartialAggregates::new(); partitions.get()];
    for record in records {
        let key = record.group_key();
        let slot = shuffle_partition(&key, partitions);
        buckets[slot]
            .entry(key)
            .or_default()
            .observe(record.purchase_amount());
    }
    buckets
}

/// Reduce side of the shuffle: merges bucket `i` of every shard into one map per bucket.
pub fn merge_shuffled(shards: Vec<Vec<PartialAggregates>>, partitions: NonZeroUsize) -> Vec<PartialAggregates> {
    let mut merged = vec![PartialAggregates::new(); partitions.get()];
    for shard in shards {
        for (slot, bucket) in shard.into_iter().enumerate() {
            let target = std::mem::take(&mut merged[slot]);
            merged[slot] = merge_partials(target, bucket);
        }
    }
    merged
}

pub fn finalize(partials: PartialAggregates) -> Vec<RegionTierSummary> {
    partials
        .into_iter()
        .map(|(key, partial)| RegionTierSummary {
            region: key.region,
            customer_tier: key.customer_tier,
            total_revenue: partial.total_revenue,
            customer_count: partial.customer_count,
        })
        .collect()
}

/// One summary per observed key, in no particular order.
pub fn aggregate<'a, I>(records: I, shuffle_partitions: NonZeroUsize) -> Vec<RegionTierSummary>
where
    I: IntoIterator<Item = &'a ClassifiedRecord>,
{
    partial_shuffle(records, shuffle_partitions)
        .into_iter()
        .flat_map(finalize)
        .collect()
}

/// Shard count used when the caller does not pick one. Group sums are added shard by shard,
/// so byte-identical `total_revenue` across runs assumes the same shard count.
pub const DEFAULT_SHARDS: usize = 4;

/// Runs the map side of the shuffle for `shards` slices of the input on blocking tasks and
/// merges their buckets.
#[cfg(feature = "runtime")]
pub async fn aggregate_concurrently(
    records: std::sync::Arc<[ClassifiedRecord]>,
    shards: NonZeroUsize,
    shuffle_partitions: NonZeroUsize,
) -> crate::Result<Vec<RegionTierSummary>> {
    use std::sync::Arc;

    let total = records.len();
    let shard_len = total.div_ceil(shards.get()).max(1);

    let handles = (0..total).step_by(shard_len).map(|start| {
        let records = Arc::clone(&records);
        let end = (start + shard_len).min(total);
        tokio::task::spawn_blocking(move || {
            partial_shuffle(&records[start..end], shuffle_partitions)
        })
    });

    let shuffled = futures::future::try_join_all(handles).await?;
    tracing::debug!(shards = shuffled.len(), "merging shuffled partial aggregates");

    Ok(merge_shuffled(shuffled, shuffle_partitions)
        .into_iter()
        .flat_map(finalize)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CleanedRecord, CustomerTier};

    fn classified(region: Option<&str>, tier: CustomerTier, amount: f64) -> ClassifiedRecord {
        ClassifiedRecord {
            record: CleanedRecord {
                customer_id: None,
                customer_name: None,
                product_id: None,
                product_name: None,
                purchase_amount: amount,
                region: region.map(str::to_string),
            },
            customer_tier: tier,
        }
    }

    fn partitions(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).expect("non-zero")
    }

    fn sorted(mut summaries: Vec<RegionTierSummary>) -> Vec<RegionTierSummary> {
        summaries.sort_by(|a, b| a.key().cmp(&b.key()));
        summaries
    }

    #[test]
    fn sums_and_counts_a_single_group() {
        let records = vec![
            classified(Some("US"), CustomerTier::Gold, 600.0),
            classified(Some("US"), CustomerTier::Gold, 700.0),
        ];
        let summaries = aggregate(&records, partitions(200));
        assert_eq!(
            summaries,
            vec![RegionTierSummary {
                region: Some("US".into()),
                customer_tier: CustomerTier::Gold,
                total_revenue: 1300.0,
                customer_count: 2,
            }]
        );
    }

    #[test]
    fn one_summary_per_key_and_counts_cover_input() {
        let records = vec![
            classified(Some("US"), CustomerTier::Gold, 600.0),
            classified(Some("US"), CustomerTier::Premium, 1600.0),
            classified(Some("EU"), CustomerTier::Gold, 550.0),
            classified(None, CustomerTier::Standard, 20.0),
            classified(None, CustomerTier::Standard, 30.0),
        ];
        let summaries = sorted(aggregate(&records, partitions(3)));
        assert_eq!(summaries.len(), 4);
        assert_eq!(
            summaries.iter().map(|s| s.customer_count).sum::<u64>(),
            records.len() as u64
        );
        assert!(summaries.iter().all(|s| s.customer_count > 0));

        let null_region = &summaries[0];
        assert_eq!(null_region.region, None);
        assert_eq!(null_region.total_revenue, 50.0);
        assert_eq!(null_region.customer_count, 2);
    }

    #[test]
    fn empty_input_produces_no_groups() {
        let records: Vec<ClassifiedRecord> = Vec::new();
        assert!(aggregate(&records, partitions(200)).is_empty());
    }

    #[test]
    fn partition_count_does_not_change_the_result() {
        let records: Vec<ClassifiedRecord> = (0..50)
            .map(|idx| {
                let region = ["US", "EU", "APAC"][idx % 3];
                let amount = (idx as f64) * 50.0 + 5.0;
                classified(
                    Some(region),
                    crate::classifier::classify_amount(amount),
                    amount,
                )
            })
            .collect();

        let single = sorted(aggregate(&records, partitions(1)));
        let many = sorted(aggregate(&records, partitions(200)));
        assert_eq!(single, many);
    }

    #[test]
    fn merging_shard_partials_matches_whole_input() {
        let records = vec![
            classified(Some("US"), CustomerTier::Gold, 600.0),
            classified(Some("US"), CustomerTier::Gold, 700.0),
            classified(Some("EU"), CustomerTier::Standard, 100.0),
            classified(Some("US"), CustomerTier::Gold, 800.0),
        ];
        let (left, right) = records.split_at(2);
        let merged = merge_partials(aggregate_partials(left), aggregate_partials(right));
        let whole = aggregate_partials(&records);
        assert_eq!(merged, whole);

        let shuffled = merge_shuffled(
            vec![
                partial_shuffle(left, partitions(4)),
                partial_shuffle(right, partitions(4)),
            ],
            partitions(4),
        );
        let from_shuffle = sorted(shuffled.into_iter().flat_map(finalize).collect());
        assert_eq!(from_shuffle, sorted(finalize(whole)));
    }
}
