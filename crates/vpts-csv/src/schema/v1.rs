//! VPTS CSV v1.0.

use odim_parser::BirdProfile;

use super::helpers::{
    attr, attr_f64, attr_to_string, check_source_file, datetime_to_proper8601, int_to_nodata,
    number_to_bool_str, values_to_strings, variable,
};
use super::{Column, SchemaVersion, SortType, VptsSchema};
use crate::error::Result;
use crate::format::{format_f64, round_to};

const COLUMNS: [&str; 26] = [
    "radar",
    "datetime",
    "height",
    "u",
    "v",
    "w",
    "ff",
    "dd",
    "sd_vvp",
    "gap",
    "eta",
    "dens",
    "dbz",
    "dbz_all",
    "n",
    "n_dbz",
    "n_all",
    "n_dbz_all",
    "rcs",
    "sd_vvp_threshold",
    "vcp",
    "radar_latitude",
    "radar_longitude",
    "radar_height",
    "radar_wavelength",
    "source_file",
];

const SORT_KEYS: [(&str, SortType); 4] = [
    ("radar", SortType::Str),
    ("datetime", SortType::Str),
    ("height", SortType::Int),
    ("source_file", SortType::Str),
];

const DUPLICATE_KEYS: [&str; 3] = ["radar", "datetime", "height"];

/// Variables copied one-to-one, as (column, quantity).
const PLAIN_VARIABLES: [(&str, &str); 6] = [
    ("u", "u"),
    ("v", "v"),
    ("w", "w"),
    ("ff", "ff"),
    ("dd", "dd"),
    ("sd_vvp", "sd_vvp"),
];

const DENSITY_VARIABLES: [(&str, &str); 8] = [
    ("eta", "eta"),
    ("dens", "dens"),
    ("dbz", "dbz"),
    ("dbz_all", "DBZH"),
    ("n", "n"),
    ("n_dbz", "n_dbz"),
    ("n_all", "n_all"),
    ("n_dbz_all", "n_dbz_all"),
];

/// VPTS CSV version 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct VptsCsvV1;

impl VptsSchema for VptsCsvV1 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V1
    }

    fn nodata(&self) -> &'static str {
        ""
    }

    fn undetect(&self) -> &'static str {
        "NaN"
    }

    fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    fn sort_keys(&self) -> &'static [(&'static str, SortType)] {
        &SORT_KEYS
    }

    fn duplicate_keys(&self) -> &'static [&'static str] {
        &DUPLICATE_KEYS
    }

    fn table_schema_url(&self) -> &'static str {
        "https://raw.githubusercontent.com/enram/vpts-csv/main/vpts-csv-table-schema.json"
    }

    fn check_source_reference<'a>(&self, reference: &'a str) -> Result<&'a str> {
        check_source_file(reference)
    }

    fn mapping(&self, profile: &BirdProfile) -> Result<Vec<Column>> {
        let (nodata, undetect) = (self.nodata(), self.undetect());
        let series = |column: &'static str, quantity: &str| -> Result<Column> {
            Ok(Column::series(
                column,
                values_to_strings(variable(profile, quantity)?, nodata, undetect),
            ))
        };

        let mut columns = Vec::with_capacity(COLUMNS.len());
        columns.push(Column::scalar("radar", profile.radar()));
        columns.push(Column::scalar(
            "datetime",
            datetime_to_proper8601(&profile.timestamp()),
        ));
        columns.push(Column::series(
            "height",
            profile.levels().iter().map(|h| h.to_string()).collect(),
        ));
        for (column, quantity) in PLAIN_VARIABLES {
            columns.push(series(column, quantity)?);
        }
        columns.push(Column::series(
            "gap",
            number_to_bool_str("gap", variable(profile, "gap")?, nodata, undetect)?,
        ));
        for (column, quantity) in DENSITY_VARIABLES {
            columns.push(series(column, quantity)?);
        }

        columns.push(Column::scalar(
            "rcs",
            attr_to_string(attr(profile.how(), "how", "rcs_bird")?),
        ));
        columns.push(Column::scalar(
            "sd_vvp_threshold",
            attr_to_string(attr(profile.how(), "how", "sd_vvp_thresh")?),
        ));
        columns.push(Column::scalar(
            "vcp",
            int_to_nodata("vcp", attr(profile.how(), "how", "vcp")?, nodata)?,
        ));
        columns.push(Column::scalar(
            "radar_latitude",
            format_f64(round_to(attr_f64(profile.location(), "where", "lat")?, 6)),
        ));
        columns.push(Column::scalar(
            "radar_longitude",
            format_f64(round_to(attr_f64(profile.location(), "where", "lon")?, 6)),
        ));
        columns.push(Column::scalar(
            "radar_height",
            (attr_f64(profile.location(), "where", "height")? as i64).to_string(),
        ));
        columns.push(Column::scalar(
            "radar_wavelength",
            format_f64(round_to(attr_f64(profile.how(), "how", "wavelength")?, 6)),
        ));
        columns.push(Column::scalar(
            "source_file",
            self.check_source_reference(profile.source_reference())?,
        ));

        Ok(columns)
    }
}
