#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use salesflow_core::PipelineConfig;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../salesflow-parser/tests/data")
        .join(name)
}

pub fn config_for(source: &Path, out: &Path) -> PipelineConfig {
    PipelineConfig::new(
        source,
        out.join("transformed_data"),
        out.join("aggregated_data"),
    )
}

pub fn read_parquet(path: &Path) -> DataFrame {
    let file = fs::File::open(path)
        .unwrap_or_else(|err| panic!("failed to open {}: {}", path.display(), err));
    ParquetReader::new(file)
        .finish()
        .unwrap_or_else(|err| panic!("failed to read {}: {}", path.display(), err))
}

/// Every file under `root`, keyed by its path relative to `root`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).expect("read_dir") {
            let path = entry.expect("dir entry").path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let relative = path.strip_prefix(root).expect("prefix").to_path_buf();
                files.insert(relative, fs::read(&path).expect("read file"));
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}
