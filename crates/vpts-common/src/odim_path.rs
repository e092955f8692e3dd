//! ODIM file path model and the group keys derived from it.
//!
//! Raw profile files live under
//! `{source}/{file_type}/{radar_code}/{year}/{month}/{day}/{file_name}` and
//! carry their identity in the file name itself:
//! `{radar_code}_{data_type}_{YYYYMMDD}T{HHMM[SS]}[Z]_*.h5`.
//! Both the inventory key and the bare file name resolve to the same
//! [`DayGroup`], which is the unit of coverage counting and rebuilds.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{VptsError, VptsResult};

/// Components encoded in a raw profile file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameParts {
    pub radar_code: String,
    pub data_type: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
    pub file_name: String,
}

/// A raw ODIM profile file located in the bucket layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OdimFilePath {
    pub source: String,
    pub radar_code: String,
    pub data_type: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
    pub file_name: String,
    pub file_type: String,
}

fn invalid(path: &str, message: impl Into<String>) -> VptsError {
    VptsError::InvalidPath {
        path: path.to_string(),
        message: message.into(),
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl OdimFilePath {
    /// Extract the file name components, ignoring any folder part.
    ///
    /// The radar code is lower-cased, so `NLDBL_vp_20080215T0000_...` and
    /// `nldbl_vp_20080215T0000_...` resolve to the same radar.
    pub fn parse_file_name(path: &str) -> VptsResult<FileNameParts> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let mut tokens = file_name.split('_');

        let (radar_code, data_type, stamp) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(r), Some(d), Some(s)) => (r, d, s),
            _ => {
                return Err(invalid(
                    path,
                    "expected {radar}_{type}_{timestamp}_... file name",
                ))
            }
        };

        if radar_code.len() < 3 || !radar_code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid(path, format!("invalid radar code '{}'", radar_code)));
        }
        if data_type.is_empty() {
            return Err(invalid(path, "empty data type"));
        }

        // Strip an extension when the timestamp is the last token
        let stamp = stamp.split('.').next().unwrap_or(stamp);
        let stamp = stamp.strip_suffix('Z').unwrap_or(stamp);
        let (date, time) = stamp
            .split_once('T')
            .ok_or_else(|| invalid(path, format!("invalid timestamp '{}'", stamp)))?;

        if date.len() != 8 || !all_digits(date) || NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
            return Err(invalid(path, format!("invalid date '{}'", date)));
        }
        if !(time.len() == 4 || time.len() == 6) || !all_digits(time) {
            return Err(invalid(path, format!("invalid time '{}'", time)));
        }
        let (hour, minute) = (&time[0..2], &time[2..4]);
        if hour > "23" || minute > "59" {
            return Err(invalid(path, format!("invalid time '{}'", time)));
        }

        Ok(FileNameParts {
            radar_code: radar_code.to_lowercase(),
            data_type: data_type.to_string(),
            year: date[0..4].to_string(),
            month: date[4..6].to_string(),
            day: date[6..8].to_string(),
            hour: hour.to_string(),
            minute: minute.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// Build from a bare file name; source and file type come from the caller.
    pub fn from_file_name(file_name: &str, source: &str, file_type: &str) -> VptsResult<Self> {
        let parts = Self::parse_file_name(file_name)?;
        Ok(Self::from_parts(parts, source, file_type))
    }

    /// Build from an inventory key: `{source}/{file_type}/.../{file_name}`.
    pub fn from_inventory(key: &str) -> VptsResult<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() < 3 || segments[0].is_empty() || segments[1].is_empty() {
            return Err(invalid(key, "expected {source}/{file_type}/.../{file_name}"));
        }
        let parts = Self::parse_file_name(key)?;
        Ok(Self::from_parts(parts, segments[0], segments[1]))
    }

    fn from_parts(parts: FileNameParts, source: &str, file_type: &str) -> Self {
        Self {
            source: source.to_string(),
            radar_code: parts.radar_code,
            data_type: parts.data_type,
            year: parts.year,
            month: parts.month,
            day: parts.day,
            hour: parts.hour,
            minute: parts.minute,
            file_name: parts.file_name,
            file_type: file_type.to_string(),
        }
    }

    /// Two-letter country prefix of the radar code.
    pub fn country(&self) -> &str {
        self.radar_code.get(..2).unwrap_or(&self.radar_code)
    }

    /// Radar identifier within the country.
    pub fn radar(&self) -> &str {
        self.radar_code.get(2..).unwrap_or("")
    }

    /// The day group this file belongs to.
    pub fn day_group(&self) -> DayGroup {
        DayGroup {
            source: self.source.clone(),
            file_type: self.file_type.clone(),
            radar_code: self.radar_code.clone(),
            year: self.year.clone(),
            month: self.month.clone(),
            day: self.day.clone(),
        }
    }

    /// Format: {radar}_vpts_{year}{month}{day}.csv
    pub fn daily_vpts_file_name(&self) -> String {
        self.day_group().daily_vpts_file_name()
    }

    /// Format: {source}/{kind}/{radar}/{year}
    pub fn path_setup(&self, kind: &str) -> String {
        format!("{}/{}/{}/{}", self.source, kind, self.radar_code, self.year)
    }

    /// Format: {source}/{file_type}/{radar}/{year}/{month}/{day}
    pub fn folder_path_h5(&self) -> String {
        self.day_group().h5_prefix()
    }

    /// Format: {source}/daily/{radar}/{year}/{radar}_vpts_{year}{month}{day}.csv
    pub fn daily_vpts_path(&self) -> String {
        self.day_group().daily_vpts_path()
    }

    /// Format: {source}/monthly/{radar}/{year}/{radar}_vpts_{year}{month}.csv.gz
    pub fn monthly_vpts_path(&self) -> String {
        self.day_group().month_group().monthly_vpts_path()
    }
}

/// URL of an object, used as the provenance reference of converted rows.
pub fn storage_url(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// Radar-day group key: (source, file_type, radar_code, year, month, day).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayGroup {
    pub source: String,
    pub file_type: String,
    pub radar_code: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

impl DayGroup {
    pub fn month_group(&self) -> MonthGroup {
        MonthGroup {
            source: self.source.clone(),
            file_type: self.file_type.clone(),
            radar_code: self.radar_code.clone(),
            year: self.year.clone(),
            month: self.month.clone(),
        }
    }

    /// Folder holding the raw files of this day.
    pub fn h5_prefix(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.source, self.file_type, self.radar_code, self.year, self.month, self.day
        )
    }

    pub fn daily_vpts_file_name(&self) -> String {
        format!(
            "{}_vpts_{}{}{}.csv",
            self.radar_code, self.year, self.month, self.day
        )
    }

    pub fn daily_vpts_path(&self) -> String {
        format!(
            "{}/{}",
            self.month_group().daily_vpts_prefix(),
            self.daily_vpts_file_name()
        )
    }
}

impl fmt::Display for DayGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.source, self.file_type, self.radar_code, self.year, self.month, self.day
        )
    }
}

/// Radar-month group key: (source, file_type, radar_code, year, month).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthGroup {
    pub source: String,
    pub file_type: String,
    pub radar_code: String,
    pub year: String,
    pub month: String,
}

impl MonthGroup {
    /// Folder holding the daily outputs of the year.
    pub fn daily_vpts_prefix(&self) -> String {
        format!("{}/daily/{}/{}", self.source, self.radar_code, self.year)
    }

    /// Substring identifying daily files of this month within the prefix.
    pub fn daily_file_marker(&self) -> String {
        format!("_vpts_{}{}", self.year, self.month)
    }

    pub fn monthly_vpts_path(&self) -> String {
        format!(
            "{}/monthly/{}/{}/{}_vpts_{}{}.csv.gz",
            self.source, self.radar_code, self.year, self.radar_code, self.year, self.month
        )
    }
}

impl fmt::Display for MonthGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.source, self.file_type, self.radar_code, self.year, self.month
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(p: &FileNameParts) -> (&str, &str, &str, &str, &str, &str, &str) {
        (
            &p.radar_code,
            &p.data_type,
            &p.year,
            &p.month,
            &p.day,
            &p.hour,
            &p.minute,
        )
    }

    #[test]
    fn test_parse_file_name_variants() {
        let cases = [
            (
                "baltrad/hdf5/fivan/2016/10/25/fivan_vp_20161025T2100Z_0x7_147742969449.h5",
                ("fivan", "vp", "2016", "10", "25", "21", "00"),
            ),
            (
                "baltrad/hdf5/fiuta/2021/11/14/fiuta_vp_20211114T214500Z_0xb.h5",
                ("fiuta", "vp", "2021", "11", "14", "21", "45"),
            ),
            (
                "baltrad/hdf5/plrze/2020/10/27/plrze_vp_20201027T172000Z_0x9.h5",
                ("plrze", "vp", "2020", "10", "27", "17", "20"),
            ),
            (
                "uva/hdf5/2008/02/15/NLDBL_vp_20080215T0000_NL50_v0-3-20.h5",
                ("nldbl", "vp", "2008", "02", "15", "00", "00"),
            ),
        ];
        for (path, expected) in cases {
            let parsed = OdimFilePath::parse_file_name(path).unwrap();
            assert_eq!(parts(&parsed), expected, "{}", path);
            assert_eq!(parsed.file_name, path.rsplit('/').next().unwrap());
        }
    }

    #[test]
    fn test_parse_file_name_invalid() {
        assert!(OdimFilePath::parse_file_name("not a valid file name").is_err());
        assert!(OdimFilePath::parse_file_name("bejab_vp_2023010_x.h5").is_err());
        assert!(OdimFilePath::parse_file_name("bejab_vp_20231301T0000Z.h5").is_err());
        assert!(OdimFilePath::parse_file_name("bejab_vp_20230101T2500Z.h5").is_err());
    }

    #[test]
    fn test_from_inventory() {
        let path = OdimFilePath::from_inventory(
            "baltrad/hdf5/fivan/2016/10/25/fivan_vp_20161025T2100Z_0x7_147742969449.h5",
        )
        .unwrap();
        assert_eq!(path.source, "baltrad");
        assert_eq!(path.file_type, "hdf5");
        assert_eq!(path.radar_code, "fivan");
        assert_eq!(path.country(), "fi");
        assert_eq!(path.radar(), "van");

        let uva = OdimFilePath::from_inventory(
            "uva/hdf5/2008/02/15/NLDBL_vp_20080215T0000_NL50_v0-3-20.h5",
        )
        .unwrap();
        assert_eq!(uva.source, "uva");
        assert_eq!(uva.radar_code, "nldbl");
    }

    #[test]
    fn test_from_inventory_requires_folders() {
        assert!(OdimFilePath::from_inventory("fivan_vp_20161025T2100Z_0x7.h5").is_err());
    }

    #[test]
    fn test_group_key_same_for_both_parse_paths() {
        let key = "baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T000000Z_0x9.h5";
        let from_inventory = OdimFilePath::from_inventory(key).unwrap();
        let from_name =
            OdimFilePath::from_file_name("nosta_vp_20230311T000000Z_0x9.h5", "baltrad", "hdf5")
                .unwrap();
        assert_eq!(from_inventory.day_group(), from_name.day_group());
        assert_eq!(from_inventory, from_name);
    }

    #[test]
    fn test_output_paths() {
        let path = OdimFilePath::from_inventory(
            "baltrad/hdf5/fiuta/2021/04/23/fiuta_vp_20210423T111500Z_0xb.h5",
        )
        .unwrap();
        assert_eq!(path.daily_vpts_file_name(), "fiuta_vpts_20210423.csv");
        assert_eq!(path.folder_path_h5(), "baltrad/hdf5/fiuta/2021/04/23");
        assert_eq!(path.path_setup("daily"), "baltrad/daily/fiuta/2021");
        assert_eq!(
            path.daily_vpts_path(),
            "baltrad/daily/fiuta/2021/fiuta_vpts_20210423.csv"
        );
        assert_eq!(
            path.monthly_vpts_path(),
            "baltrad/monthly/fiuta/2021/fiuta_vpts_202104.csv.gz"
        );
        assert_eq!(
            storage_url("aloft", "baltrad/hdf5/x.h5"),
            "s3://aloft/baltrad/hdf5/x.h5"
        );
    }

    #[test]
    fn test_group_display_and_order() {
        let a = OdimFilePath::from_inventory("baltrad/hdf5/nosta/2023/03/11/nosta_vp_20230311T0000Z.h5")
            .unwrap()
            .day_group();
        let b = OdimFilePath::from_inventory("baltrad/hdf5/nosta/2023/03/12/nosta_vp_20230312T0000Z.h5")
            .unwrap()
            .day_group();
        assert!(a < b);
        assert_eq!(a.to_string(), "baltrad/hdf5/nosta/2023/03/11");
        assert_eq!(a.month_group(), b.month_group());
        assert_eq!(a.month_group().daily_file_marker(), "_vpts_202303");
    }
}
