//! In-memory profile container.

use std::collections::BTreeMap;

use crate::attrs::{AttrMap, AttrValue};
use crate::codec::RawSamples;
use crate::error::{OdimError, OdimResult};
use crate::source::{MetaGroup, ProfileSource};

#[derive(Debug, Clone)]
struct DataGroup {
    what: AttrMap,
    samples: RawSamples,
}

/// A [`ProfileSource`] held entirely in memory.
///
/// Mirrors the ODIM layout: root `what`/`where`/`how` groups and numbered
/// datasets containing data groups.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfile {
    identity: String,
    root: BTreeMap<&'static str, AttrMap>,
    datasets: BTreeMap<String, BTreeMap<String, DataGroup>>,
}

impl MemoryProfile {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Set one attribute of a root metadata group, creating the group.
    pub fn with_attr(mut self, group: MetaGroup, name: &str, value: impl Into<AttrValue>) -> Self {
        self.root
            .entry(group.as_str())
            .or_default()
            .insert(name.to_string(), value.into());
        self
    }

    /// Create an empty root metadata group.
    pub fn with_group(mut self, group: MetaGroup) -> Self {
        self.root.entry(group.as_str()).or_default();
        self
    }

    /// Add a data group with its `what` attributes and samples.
    pub fn with_data(
        mut self,
        dataset: &str,
        data: &str,
        what: AttrMap,
        samples: RawSamples,
    ) -> Self {
        self.datasets
            .entry(dataset.to_string())
            .or_default()
            .insert(data.to_string(), DataGroup { what, samples });
        self
    }

    fn data_group(&self, dataset: &str, data: &str) -> OdimResult<&DataGroup> {
        self.datasets
            .get(dataset)
            .and_then(|groups| groups.get(data))
            .ok_or_else(|| OdimError::Decode {
                location: format!("{}:{}/{}", self.identity, dataset, data),
                message: "no such group".to_string(),
            })
    }
}

impl ProfileSource for MemoryProfile {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn root_groups(&self) -> OdimResult<Vec<String>> {
        Ok(self
            .root
            .keys()
            .map(|k| k.to_string())
            .chain(self.datasets.keys().cloned())
            .collect())
    }

    fn root_attrs(&self, group: MetaGroup) -> OdimResult<AttrMap> {
        self.root
            .get(group.as_str())
            .cloned()
            .ok_or_else(|| OdimError::Decode {
                location: format!("{}:{}", self.identity, group.as_str()),
                message: "no such group".to_string(),
            })
    }

    fn data_names(&self, dataset: &str) -> OdimResult<Vec<String>> {
        self.datasets
            .get(dataset)
            .map(|groups| groups.keys().cloned().collect())
            .ok_or_else(|| OdimError::Decode {
                location: format!("{}:{}", self.identity, dataset),
                message: "no such group".to_string(),
            })
    }

    fn data_attrs(&self, dataset: &str, data: &str) -> OdimResult<AttrMap> {
        Ok(self.data_group(dataset, data)?.what.clone())
    }

    fn data_samples(&self, dataset: &str, data: &str) -> OdimResult<RawSamples> {
        Ok(self.data_group(dataset, data)?.samples.clone())
    }
}
