//! Read access to an ODIM profile container.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::attrs::{require_text, AttrMap};
use crate::codec::RawSamples;
use crate::error::{OdimError, OdimResult};

/// The three root metadata groups of an ODIM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaGroup {
    What,
    Where,
    How,
}

impl MetaGroup {
    pub const ALL: [MetaGroup; 3] = [MetaGroup::What, MetaGroup::Where, MetaGroup::How];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaGroup::What => "what",
            MetaGroup::Where => "where",
            MetaGroup::How => "how",
        }
    }
}

/// Expected `what/object` value of a vertical profile.
pub const VERTICAL_PROFILE_OBJECT: &str = "VP";

/// A container exposing ODIM groups, attributes and sample arrays.
///
/// Implemented by [`crate::OdimReader`] for HDF5 files and by
/// [`crate::MemoryProfile`] for in-memory profiles.
pub trait ProfileSource {
    /// Identity of the container (path or URI) used in error reports.
    fn identity(&self) -> &str;

    /// Names of the groups directly under the root.
    fn root_groups(&self) -> OdimResult<Vec<String>>;

    /// Attributes of a root metadata group.
    fn root_attrs(&self, group: MetaGroup) -> OdimResult<AttrMap>;

    /// Names of the data groups of a dataset, metadata groups excluded.
    fn data_names(&self, dataset: &str) -> OdimResult<Vec<String>>;

    /// `what` attributes of a data group.
    fn data_attrs(&self, dataset: &str, data: &str) -> OdimResult<AttrMap>;

    /// First column of a data group's sample array.
    fn data_samples(&self, dataset: &str, data: &str) -> OdimResult<RawSamples>;

    /// Root groups holding datasets, in numeric order.
    fn dataset_names(&self) -> OdimResult<Vec<String>> {
        let mut names: Vec<String> = self
            .root_groups()?
            .into_iter()
            .filter(|name| name.contains("dataset"))
            .collect();
        names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Ok(names)
    }

    /// Acquisition time from `what/date` and `what/time`, in UTC.
    fn root_datetime(&self) -> OdimResult<DateTime<Utc>> {
        let what = self.root_attrs(MetaGroup::What)?;
        let date = require_text(&what, "what", "date")?;
        let time = require_text(&what, "what", "time")?;
        parse_odim_datetime(date, time)
    }

    /// `what/source` split into its `KEY:VALUE` pairs.
    fn root_source(&self) -> OdimResult<BTreeMap<String, String>> {
        let what = self.root_attrs(MetaGroup::What)?;
        parse_source(require_text(&what, "what", "source")?)
    }

    /// `what/object`, the kind discriminator of the file.
    fn root_object(&self) -> OdimResult<String> {
        let what = self.root_attrs(MetaGroup::What)?;
        Ok(require_text(&what, "what", "object")?.to_string())
    }
}

/// Parse ODIM `YYYYMMDD` + `HHMMSS` as UTC.
pub fn parse_odim_datetime(date: &str, time: &str) -> OdimResult<DateTime<Utc>> {
    let joined = format!("{}{}", date.trim(), time.trim());
    let naive = NaiveDateTime::parse_from_str(&joined, "%Y%m%d%H%M%S")
        .map_err(|e| OdimError::invalid("what", "date/time", format!("'{}': {}", joined, e)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Parse `WMO:06477,RAD:BX41,NOD:bewid` into a map.
pub fn parse_source(source: &str) -> OdimResult<BTreeMap<String, String>> {
    source
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| {
                    OdimError::invalid("what", "source", format!("entry '{}' is not KEY:VALUE", entry))
                })
        })
        .collect()
}

/// Check the container is an ODIM file holding a vertical profile.
///
/// Missing root groups give [`OdimError::InvalidSource`]; any other
/// `what/object` gives [`OdimError::NotVerticalProfile`].
pub fn check_vp_odim<S: ProfileSource + ?Sized>(source: &S) -> OdimResult<()> {
    let groups = source.root_groups()?;
    for group in MetaGroup::ALL {
        if !groups.iter().any(|g| g == group.as_str()) {
            return Err(OdimError::InvalidSource(format!(
                "{}: file does not contain what/how/where group information",
                source.identity()
            )));
        }
    }

    let object = source.root_object()?;
    if object != VERTICAL_PROFILE_OBJECT {
        return Err(OdimError::NotVerticalProfile { found: object });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        let parsed =
            parse_source("WMO:06477,RAD:BX41,PLC:Wideumont,NOD:bewid,CTY:605,CMT:VolumeScanZ")
                .unwrap();
        assert_eq!(parsed.len(), 6);
        assert_eq!(parsed["NOD"], "bewid");
        assert_eq!(parsed["PLC"], "Wideumont");
        assert_eq!(parsed["CMT"], "VolumeScanZ");
    }

    #[test]
    fn test_parse_source_rejects_bare_entry() {
        assert!(parse_source("WMO:06477,bewid").is_err());
    }

    #[test]
    fn test_parse_odim_datetime() {
        let dt = parse_odim_datetime("20230311", "000500").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2023, 3, 11, 0, 5, 0).unwrap());
        assert!(parse_odim_datetime("20231311", "000500").is_err());
    }
}
