pub mod aggregator;
pub mod classifier;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod summary;
pub mod types;
pub mod writer;

pub use config::{PipelineConfig, DEFAULT_SHUFFLE_PARTITIONS};
pub use error::{PipelineError, Result};
pub use pipeline::{LoadedBatch, PipelineSession};
pub use summary::RunSummary;
pub use types::{
    ClassifiedRecord, CleanedRecord, CustomerTier, GroupKey, Record, RegionTierSummary,
};
