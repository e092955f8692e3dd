//! Service configuration: YAML file plus CLI/environment overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use aggregation::AggregationConfig;
use storage::ObjectStorageConfig;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Connection settings shared by the data and inventory buckets
    pub storage: ObjectStorageConfig,
    pub aggregation: AggregationConfig,
}

/// Values taken from the command line or the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bucket: Option<String>,
    pub inventory_bucket: Option<String>,
    pub modified_days_ago: Option<u32>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub allow_http: bool,
}

impl ServiceConfig {
    /// Load from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load the file if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(bucket) = &overrides.bucket {
            self.aggregation.bucket = bucket.clone();
        }
        if let Some(bucket) = &overrides.inventory_bucket {
            self.aggregation.inventory_bucket = bucket.clone();
        }
        if let Some(days) = overrides.modified_days_ago {
            self.aggregation.modified_days_ago = days;
        }
        if let Some(endpoint) = &overrides.endpoint {
            self.storage.endpoint = endpoint.clone();
        }
        if let Some(region) = &overrides.region {
            self.storage.region = region.clone();
        }
        if overrides.allow_http {
            self.storage.allow_http = true;
        }
    }

    pub fn data_storage(&self) -> ObjectStorageConfig {
        self.storage.for_bucket(&self.aggregation.bucket)
    }

    pub fn inventory_storage(&self) -> ObjectStorageConfig {
        self.storage.for_bucket(&self.aggregation.inventory_bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_with_overrides() {
        let mut config = ServiceConfig::from_yaml_str(
            "storage:\n  region: eu-central-1\naggregation:\n  bucket: aloftdata\n  modified_days_ago: 4\n",
        )
        .unwrap();
        assert_eq!(config.storage.region, "eu-central-1");
        assert_eq!(config.aggregation.bucket, "aloftdata");

        config.apply(&Overrides {
            inventory_bucket: Some("aloftdata-inventory".to_string()),
            modified_days_ago: Some(0),
            ..Default::default()
        });
        assert_eq!(config.aggregation.modified_days_ago, 0);
        assert_eq!(config.data_storage().bucket, "aloftdata");
        assert_eq!(config.inventory_storage().bucket, "aloftdata-inventory");
        assert_eq!(config.inventory_storage().region, "eu-central-1");
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = ServiceConfig::load(Some(Path::new("/nonexistent/vpts.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/vpts.yaml"));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = ServiceConfig::load(None).unwrap();
        assert_eq!(config.aggregation.bucket, "aloft");
        assert_eq!(config.aggregation.inventory_bucket, "aloft-inventory");
    }
}
