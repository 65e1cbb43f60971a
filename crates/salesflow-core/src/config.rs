//! Run configuration, resolved from layers: defaults, an optional TOML file, environment
//! variables and finally command-line flags. Later layers win field by field.

use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_SHUFFLE_PARTITIONS: usize = 200;

pub const ENV_SOURCE_PATH: &str = "SALESFLOW_SOURCE_PATH";
pub const ENV_TRANSFORMED_PATH: &str = "SALESFLOW_TRANSFORMED_PATH";
pub const ENV_AGGREGATED_PATH: &str = "SALESFLOW_AGGREGATED_PATH";
pub const ENV_SHUFFLE_PARTITIONS: &str = "SALESFLOW_SHUFFLE_PARTITIONS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source_path: PathBuf,
    pub transformed_path: PathBuf,
    pub aggregated_path: PathBuf,
    pub shuffle_partitions: NonZeroUsize,
}

/// One partially-specified configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub source_path: Option<PathBuf>,
    pub transformed_path: Option<PathBuf>,
    pub aggregated_path: Option<PathBuf>,
    pub shuffle_partitions: Option<usize>,
}

impl ConfigLayer {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|err| PipelineError::configuration(format!("invalid TOML config: {err}")))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            PipelineError::configuration(format!(
                "failed to read config file {}: {err}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let path = |name: &str| vars.get(name).map(PathBuf::from);

        let shuffle_partitions = match vars.get(ENV_SHUFFLE_PARTITIONS) {
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|err| {
                PipelineError::configuration(format!(
                    "{ENV_SHUFFLE_PARTITIONS} must be a positive integer, got '{raw}': {err}"
                ))
            })?),
            None => None,
        };

        Ok(Self {
            source_path: path(ENV_SOURCE_PATH),
            transformed_path: path(ENV_TRANSFORMED_PATH),
            aggregated_path: path(ENV_AGGREGATED_PATH),
            shuffle_partitions,
        })
    }

    /// Folds layers, lowest precedence first.
    pub fn merged<I>(layers: I) -> ConfigLayer
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::overlay)
    }

    pub fn require_source(&self) -> Result<PathBuf> {
        match &self.source_path {
            Some(path) if !path.as_os_str().is_empty() => Ok(path.clone()),
            _ => Err(PipelineError::configuration(format!(
                "missing source_path; set it in the config file, via {ENV_SOURCE_PATH}, or on the command line"
            ))),
        }
    }

    /// Fields set in `higher` replace those in `self`.
    pub fn overlay(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            source_path: higher.source_path.or(self.source_path),
            transformed_path: higher.transformed_path.or(self.transformed_path),
            aggregated_path: higher.aggregated_path.or(self.aggregated_path),
            shuffle_partitions: higher.shuffle_partitions.or(self.shuffle_partitions),
        }
    }
}

impl PipelineConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        transformed_path: impl Into<PathBuf>,
        aggregated_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            transformed_path: transformed_path.into(),
            aggregated_path: aggregated_path.into(),
            shuffle_partitions: NonZeroUsize::new(DEFAULT_SHUFFLE_PARTITIONS)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn with_shuffle_partitions(mut self, shuffle_partitions: NonZeroUsize) -> Self {
        self.shuffle_partitions = shuffle_partitions;
        self
    }

    /// Folds the layers (lowest precedence first) over the defaults and validates the result.
    pub fn resolve<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let merged = ConfigLayer::merged(layers);

        let source_path = merged.require_source()?;
        let transformed_path =
            required_path(merged.transformed_path, "transformed_path", ENV_TRANSFORMED_PATH)?;
        let aggregated_path =
            required_path(merged.aggregated_path, "aggregated_path", ENV_AGGREGATED_PATH)?;

        let partitions = merged
            .shuffle_partitions
            .unwrap_or(DEFAULT_SHUFFLE_PARTITIONS);
        let shuffle_partitions = NonZeroUsize::new(partitions).ok_or_else(|| {
            PipelineError::configuration("shuffle_partitions must be greater than zero")
        })?;

        let config = Self {
            source_path,
            transformed_path,
            aggregated_path,
            shuffle_partitions,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("source_path", &self.source_path),
            ("transformed_path", &self.transformed_path),
            ("aggregated_path", &self.aggregated_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::configuration(format!("{name} must not be empty")));
            }
        }

        let source = resolve_path(&self.source_path)?;
        let transformed = resolve_path(&self.transformed_path)?;
        let aggregated = resolve_path(&self.aggregated_path)?;

        if overlaps(&transformed, &aggregated) {
            return Err(PipelineError::configuration(format!(
                "transformed_path {} and aggregated_path {} must not overlap",
                self.transformed_path.display(),
                self.aggregated_path.display()
            )));
        }

        for (name, path, destination) in [
            ("transformed_path", &self.transformed_path, &transformed),
            ("aggregated_path", &self.aggregated_path, &aggregated),
        ] {
            if source.starts_with(destination) {
                return Err(PipelineError::configuration(format!(
                    "{name} {} would overwrite the source {}",
                    path.display(),
                    self.source_path.display()
                )));
            }
        }

        Ok(())
    }
}

/// Makes `path` absolute and resolves it through the filesystem as far as it exists; the
/// remaining components are normalized lexically.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|err| {
            PipelineError::configuration(format!("failed to read working directory: {err}"))
        })?;
        cwd.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => {
                resolved.push(other);
                if let Ok(canonical) = resolved.canonicalize() {
                    resolved = canonical;
                }
            }
        }
    }
    Ok(resolved)
}

fn required_path(value: Option<PathBuf>, field: &str, env: &str) -> Result<PathBuf> {
    value.ok_or_else(|| {
        PipelineError::configuration(format!(
            "missing {field}; set it in the config file, via {env}, or on the command line"
        ))
    })
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}
