//! The canonical in-memory vertical profile.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::attrs::{require_text, AttrMap};
use crate::codec::{decode, Number, ProfileValue, SampleCoding};
use crate::error::{OdimError, OdimResult};
use crate::source::{MetaGroup, ProfileSource};

/// Quantity tag of the data group holding the height levels.
pub const HEIGHT_QUANTITY: &str = "HGHT";

/// Identifier key of the radar node code in `what/source`.
pub const RADAR_NODE_KEY: &str = "NOD";

/// One radar's vertical profile at one instant.
///
/// Built once per source file and read-only afterwards. Profiles compare
/// and order by `(timestamp, source_reference)`.
#[derive(Debug, Clone)]
pub struct BirdProfile {
    identifiers: BTreeMap<String, String>,
    timestamp: DateTime<Utc>,
    levels: Vec<i64>,
    variables: BTreeMap<String, Vec<ProfileValue>>,
    what: AttrMap,
    location: AttrMap,
    how: AttrMap,
    source_reference: String,
}

impl BirdProfile {
    /// Build a profile from a container.
    ///
    /// The container is expected to have passed [`crate::check_vp_odim`].
    pub fn from_source<S: ProfileSource + ?Sized>(
        source: &S,
        source_reference: impl Into<String>,
    ) -> OdimResult<Self> {
        let source_reference = source_reference.into();
        if source_reference.is_empty() {
            return Err(OdimError::EmptySourceReference);
        }

        let what = source.root_attrs(MetaGroup::What)?;
        let location = source.root_attrs(MetaGroup::Where)?;
        let how = source.root_attrs(MetaGroup::How)?;
        let timestamp = source.root_datetime()?;
        let identifiers = source.root_source()?;
        if !identifiers.contains_key(RADAR_NODE_KEY) {
            return Err(OdimError::missing("what", "source:NOD"));
        }

        let dataset = source
            .dataset_names()?
            .into_iter()
            .next()
            .ok_or_else(|| {
                OdimError::InvalidSource(format!("{}: no dataset groups", source.identity()))
            })?;

        let mut levels = None;
        let mut variables = BTreeMap::new();
        for data in source.data_names(&dataset)? {
            let group = format!("{}/{}/what", dataset, data);
            let attrs = source.data_attrs(&dataset, &data)?;
            let quantity = require_text(&attrs, &group, "quantity")?.to_string();
            let coding = SampleCoding::from_attrs(&attrs, &group)?;
            let decoded = decode(&source.data_samples(&dataset, &data)?, &coding);

            if quantity == HEIGHT_QUANTITY {
                if levels.is_some() {
                    return Err(OdimError::DuplicateQuantity(quantity));
                }
                levels = Some(to_levels(&decoded)?);
            } else if variables.insert(quantity.clone(), decoded).is_some() {
                return Err(OdimError::DuplicateQuantity(quantity));
            }
        }

        let levels =
            levels.ok_or_else(|| OdimError::MissingHeight(HEIGHT_QUANTITY.to_string()))?;
        for (quantity, values) in &variables {
            if values.len() != levels.len() {
                return Err(OdimError::LengthMismatch {
                    quantity: quantity.clone(),
                    expected: levels.len(),
                    found: values.len(),
                });
            }
        }

        debug!(
            source = %source.identity(),
            levels = levels.len(),
            variables = variables.len(),
            "Built bird profile"
        );

        Ok(Self {
            identifiers,
            timestamp,
            levels,
            variables,
            what,
            location,
            how,
            source_reference,
        })
    }

    /// Radar node code, the canonical radar identity.
    pub fn radar(&self) -> &str {
        self.identifiers
            .get(RADAR_NODE_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// `what/source` pairs; always holds [`RADAR_NODE_KEY`].
    pub fn identifiers(&self) -> &BTreeMap<String, String> {
        &self.identifiers
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Height levels in meters, in file order.
    pub fn levels(&self) -> &[i64] {
        &self.levels
    }

    /// Decoded variables keyed by quantity, aligned with [`Self::levels`].
    pub fn variables(&self) -> &BTreeMap<String, Vec<ProfileValue>> {
        &self.variables
    }

    pub fn variable(&self, quantity: &str) -> Option<&[ProfileValue]> {
        self.variables.get(quantity).map(Vec::as_slice)
    }

    pub fn what(&self) -> &AttrMap {
        &self.what
    }

    /// The ODIM `where` group.
    pub fn location(&self) -> &AttrMap {
        &self.location
    }

    pub fn how(&self) -> &AttrMap {
        &self.how
    }

    /// File name or URI the profile was read from.
    pub fn source_reference(&self) -> &str {
        &self.source_reference
    }

    fn sort_key(&self) -> (&DateTime<Utc>, &str) {
        (&self.timestamp, &self.source_reference)
    }
}

impl PartialEq for BirdProfile {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for BirdProfile {}

impl PartialOrd for BirdProfile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BirdProfile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for BirdProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bird profile: {} - {:?}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.identifiers
        )
    }
}

fn to_levels(decoded: &[ProfileValue]) -> OdimResult<Vec<i64>> {
    decoded
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            ProfileValue::Value(Number::Int(v)) => Ok(*v),
            ProfileValue::Value(n) => Ok(n.as_f64() as i64),
            _ => Err(OdimError::InvalidLevel { index }),
        })
        .collect()
}
